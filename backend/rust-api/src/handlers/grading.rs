//! Teacher-facing grading endpoints: the ungraded-section queue and the
//! grade operation.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::exam::SectionType,
    models::grading::GradeSectionRequest,
    services::{grading_service::GradingService, AppState},
};

fn grading_service(state: &Arc<AppState>) -> GradingService {
    GradingService::new(state.store.clone(), state.notifier.clone())
}

pub async fn grading_queue(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let queue = grading_service(&state).queue_for_teacher(&claims).await?;
    Ok(Json(queue))
}

pub async fn grade_section(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((attempt_id, section_type)): Path<(String, SectionType)>,
    AppJson(request): AppJson<GradeSectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = grading_service(&state)
        .grade_section(&claims, &attempt_id, section_type, request)
        .await?;
    Ok(Json(response))
}
