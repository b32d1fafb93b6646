use std::sync::Arc;

use axum::{routing::get, Router};

use consultation_cell::router::consultation_routes;
use professor_cell::router::professor_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Campus Consultation API is running!" }))
        .nest("/api/consultations", consultation_routes(state.clone()))
        .nest("/api/professors", professor_routes(state.clone()))
}
