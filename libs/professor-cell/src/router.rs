// libs/professor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn professor_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/{professor_id}/profile", get(handlers::get_professor_profile))
        .route("/{professor_id}/profile", put(handlers::update_professor_profile))
        .route("/{professor_id}/availability", get(handlers::get_professor_availability))
        .route(
            "/{professor_id}/ratings/recalculate",
            post(handlers::recalculate_professor_ratings),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
