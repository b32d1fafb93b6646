// libs/consultation-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BookConsultationRequest, CancelConsultationRequest, Consultation, ConsultationError,
    ConsultationSearchQuery, CreateCancellationRequest, CreateRescheduleRequest,
    ProcessRequestBody, ProposeRescheduleRequest, RateConsultationRequest,
};
use crate::services::booking::ConsultationService;
use crate::services::requests::RequestWorkflowService;

fn map_consultation_error(e: ConsultationError) -> AppError {
    match e {
        ConsultationError::NotFound => AppError::NotFound("Consultation not found".to_string()),
        ConsultationError::ValidationError(msg) => AppError::ValidationError(msg),
        e @ ConsultationError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
        ConsultationError::PolicyViolation(msg) => AppError::PolicyViolation(msg),
        ConsultationError::InvalidState(msg) => AppError::Conflict(msg),
        ConsultationError::DatabaseError(msg) => AppError::Database(msg),
        // Sync failures are handled (logged) inside the service; one
        // reaching this far is a bug, but it must not leak as a 4xx.
        ConsultationError::ExternalSyncFailure(msg) => AppError::Internal(msg),
    }
}

fn caller_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

fn workflow_service(config: &Arc<AppConfig>) -> RequestWorkflowService {
    let supabase = Arc::new(SupabaseClient::new(config));
    RequestWorkflowService::new(supabase, Arc::new(ConsultationService::new(config)))
}

fn require_professor_of(user: &User, consultation: &Consultation) -> Result<(), AppError> {
    if !user.is_party(&consultation.professor_id) {
        return Err(AppError::Forbidden(
            "Only the consultation's professor can perform this action".to_string(),
        ));
    }
    Ok(())
}

fn require_student_of(user: &User, consultation: &Consultation) -> Result<(), AppError> {
    if !user.is_party(&consultation.student_id) {
        return Err(AppError::Forbidden(
            "Only the consultation's student can perform this action".to_string(),
        ));
    }
    Ok(())
}

fn require_party_of(user: &User, consultation: &Consultation) -> Result<(), AppError> {
    if !user.is_party(&consultation.student_id)
        && !user.is_party(&consultation.professor_id)
        && !user.is_admin()
    {
        return Err(AppError::Forbidden(
            "Not a party to this consultation".to_string(),
        ));
    }
    Ok(())
}

// ==============================================================================
// BOOKING & QUERIES
// ==============================================================================

#[axum::debug_handler]
pub async fn book_consultation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_student() {
        return Err(AppError::Forbidden(
            "Only students can book consultations".to_string(),
        ));
    }
    let student_id = caller_id(&user)?;

    let service = ConsultationService::new(&state);
    let consultation = service
        .book(student_id, request, auth.token())
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": consultation
    })))
}

#[axum::debug_handler]
pub async fn search_consultations(
    State(state): State<Arc<AppConfig>>,
    Query(mut query): Query<ConsultationSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let id = caller_id(&user)?;

    // Non-admin callers only ever see their own consultations, whatever
    // filters they asked for.
    if user.is_student() {
        query.student_id = Some(id);
    } else if user.is_professor() {
        query.professor_id = Some(id);
    } else if !user.is_admin() {
        return Err(AppError::Forbidden("Unknown role".to_string()));
    }

    let service = ConsultationService::new(&state);
    let consultations = service
        .search(&query, auth.token())
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "count": consultations.len(),
        "consultations": consultations
    })))
}

#[axum::debug_handler]
pub async fn get_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&state);
    let consultation = service
        .get(&consultation_id, auth.token())
        .await
        .map_err(map_consultation_error)?;

    require_party_of(&user, &consultation)?;

    Ok(Json(json!(consultation)))
}

// ==============================================================================
// LIFECYCLE TRANSITIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn confirm_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_professor_of(&user, &consultation)?;

    let confirmed = service
        .confirm(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": confirmed
    })))
}

#[axum::debug_handler]
pub async fn cancel_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_party_of(&user, &consultation)?;

    let cancelled = service
        .cancel(&consultation_id, Some(request.reason), token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": cancelled
    })))
}

#[axum::debug_handler]
pub async fn complete_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_professor_of(&user, &consultation)?;

    let completed = service
        .complete(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": completed
    })))
}

#[axum::debug_handler]
pub async fn mark_consultation_no_show(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_professor_of(&user, &consultation)?;

    let marked = service
        .mark_no_show(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": marked
    })))
}

#[axum::debug_handler]
pub async fn propose_consultation_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ProposeRescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_professor_of(&user, &consultation)?;

    let proposed = service
        .propose_reschedule(&consultation_id, request, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": proposed
    })))
}

#[axum::debug_handler]
pub async fn accept_consultation_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_student_of(&user, &consultation)?;

    let accepted = service
        .accept_reschedule(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": accepted
    })))
}

#[axum::debug_handler]
pub async fn reject_consultation_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_student_of(&user, &consultation)?;

    let rejected = service
        .reject_reschedule(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": rejected
    })))
}

#[axum::debug_handler]
pub async fn rate_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RateConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_student_of(&user, &consultation)?;

    let rated = service
        .rate(&consultation_id, request.rating, request.feedback, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "consultation": rated
    })))
}

#[axum::debug_handler]
pub async fn delete_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can delete consultations".to_string(),
        ));
    }

    let service = ConsultationService::new(&state);
    service
        .delete(&consultation_id, auth.token())
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Consultation deleted"
    })))
}

// ==============================================================================
// CANCELLATION / RESCHEDULE REQUEST WORKFLOW
// ==============================================================================

#[axum::debug_handler]
pub async fn create_cancellation_request(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateCancellationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let requested_by = caller_id(&user)?;

    let service = ConsultationService::new(&state);
    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_party_of(&user, &consultation)?;

    let workflow = workflow_service(&state);
    let record = workflow
        .create_cancellation_request(&consultation_id, requested_by, request, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "request": record
    })))
}

#[axum::debug_handler]
pub async fn approve_cancellation_request(
    State(state): State<Arc<AppConfig>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(body): Json<ProcessRequestBody>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can process requests".to_string(),
        ));
    }
    let processed_by = caller_id(&user)?;

    let workflow = workflow_service(&state);
    let record = workflow
        .approve_cancellation(&request_id, &processed_by, body.note, auth.token())
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "request": record
    })))
}

#[axum::debug_handler]
pub async fn reject_cancellation_request(
    State(state): State<Arc<AppConfig>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(body): Json<ProcessRequestBody>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can process requests".to_string(),
        ));
    }
    let processed_by = caller_id(&user)?;

    let workflow = workflow_service(&state);
    let record = workflow
        .reject_cancellation(&request_id, &processed_by, body.note, auth.token())
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "request": record
    })))
}

#[axum::debug_handler]
pub async fn create_reschedule_request(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let requested_by = caller_id(&user)?;

    let service = ConsultationService::new(&state);
    let consultation = service
        .get(&consultation_id, token)
        .await
        .map_err(map_consultation_error)?;
    require_party_of(&user, &consultation)?;

    let workflow = workflow_service(&state);
    let record = workflow
        .create_reschedule_request(&consultation_id, requested_by, request, token)
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "request": record
    })))
}

#[axum::debug_handler]
pub async fn approve_reschedule_request(
    State(state): State<Arc<AppConfig>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(body): Json<ProcessRequestBody>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can process requests".to_string(),
        ));
    }
    let processed_by = caller_id(&user)?;

    let workflow = workflow_service(&state);
    let record = workflow
        .approve_reschedule(&request_id, &processed_by, body.note, auth.token())
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "request": record
    })))
}

#[axum::debug_handler]
pub async fn reject_reschedule_request(
    State(state): State<Arc<AppConfig>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(body): Json<ProcessRequestBody>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators can process requests".to_string(),
        ));
    }
    let processed_by = caller_id(&user)?;

    let workflow = workflow_service(&state);
    let record = workflow
        .reject_reschedule_request(&request_id, &processed_by, body.note, auth.token())
        .await
        .map_err(map_consultation_error)?;

    Ok(Json(json!({
        "success": true,
        "request": record
    })))
}
