// libs/professor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ProfessorError, UpdateProfileRequest};
use crate::services::profile::ProfessorProfileService;
use crate::services::rating::RatingAggregator;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub day: String,
}

fn map_professor_error(e: ProfessorError) -> AppError {
    match e {
        ProfessorError::NotFound => AppError::NotFound("Professor profile not found".to_string()),
        ProfessorError::ValidationError(msg) => AppError::ValidationError(msg),
        ProfessorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn get_professor_profile(
    State(state): State<Arc<AppConfig>>,
    Path(professor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ProfessorProfileService::new(&state);

    // Profiles are created lazily with defaults the first time anyone
    // needs them (students rely on this to read the notice-hours policy).
    let profile = service
        .get_or_create(professor_id, token)
        .await
        .map_err(map_professor_error)?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_professor_profile(
    State(state): State<Arc<AppConfig>>,
    Path(professor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_owner = user.is_party(&professor_id);
    if !is_owner && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to update this professor profile".to_string(),
        ));
    }

    let service = ProfessorProfileService::new(&state);
    let profile = service
        .update_settings(professor_id, request, token)
        .await
        .map_err(map_professor_error)?;

    Ok(Json(json!({
        "success": true,
        "profile": profile,
        "message": "Profile updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_professor_availability(
    State(state): State<Arc<AppConfig>>,
    Path(professor_id): Path<Uuid>,
    Query(params): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ProfessorProfileService::new(&state);

    let profile = service
        .get_or_create(professor_id, token)
        .await
        .map_err(map_professor_error)?;

    let slots = profile.available_slots(&params.day);

    Ok(Json(json!({
        "professor_id": professor_id,
        "day": params.day.to_lowercase(),
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn recalculate_professor_ratings(
    State(state): State<Arc<AppConfig>>,
    Path(professor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can force a rating recalculation".to_string(),
        ));
    }

    let aggregator = RatingAggregator::new(&state);
    let (average_rating, total_reviews) = aggregator
        .recalculate(professor_id, token)
        .await
        .map_err(map_professor_error)?;

    Ok(Json(json!({
        "success": true,
        "professor_id": professor_id,
        "average_rating": average_rating,
        "total_reviews": total_reviews
    })))
}
