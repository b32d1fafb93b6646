// libs/consultation-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn consultation_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::book_consultation))
        .route("/search", get(handlers::search_consultations))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .route("/{consultation_id}", delete(handlers::delete_consultation))
        .route("/{consultation_id}/confirm", patch(handlers::confirm_consultation))
        .route("/{consultation_id}/cancel", post(handlers::cancel_consultation))
        .route("/{consultation_id}/complete", patch(handlers::complete_consultation))
        .route("/{consultation_id}/no-show", patch(handlers::mark_consultation_no_show))
        .route(
            "/{consultation_id}/propose-reschedule",
            patch(handlers::propose_consultation_reschedule),
        )
        .route(
            "/{consultation_id}/accept-reschedule",
            patch(handlers::accept_consultation_reschedule),
        )
        .route(
            "/{consultation_id}/reject-reschedule",
            patch(handlers::reject_consultation_reschedule),
        )
        .route("/{consultation_id}/rate", post(handlers::rate_consultation))
        .route(
            "/{consultation_id}/cancellation-requests",
            post(handlers::create_cancellation_request),
        )
        .route(
            "/cancellation-requests/{request_id}/approve",
            post(handlers::approve_cancellation_request),
        )
        .route(
            "/cancellation-requests/{request_id}/reject",
            post(handlers::reject_cancellation_request),
        )
        .route(
            "/{consultation_id}/reschedule-requests",
            post(handlers::create_reschedule_request),
        )
        .route(
            "/reschedule-requests/{request_id}/approve",
            post(handlers::approve_reschedule_request),
        )
        .route(
            "/reschedule-requests/{request_id}/reject",
            post(handlers::reject_reschedule_request),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
