//! Student-facing attempt endpoints: create from booking, read state,
//! drive per-section transitions, submit, and (teacher-only) rescore.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::attempt::Answer,
    models::exam::SectionType,
    services::{attempt_service::AttemptService, AppState},
};

fn attempt_service(state: &Arc<AppState>) -> AttemptService {
    AttemptService::new(
        state.store.clone(),
        state.catalog.clone(),
        state.notifier.clone(),
    )
}

#[derive(Debug, Deserialize)]
pub struct CreateAttemptPayload {
    pub booking_id: String,
}

pub async fn create_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(payload): AppJson<CreateAttemptPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let view = attempt_service(&state)
        .create_attempt(&claims, &payload.booking_id)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = attempt_service(&state)
        .fetch_state(&claims, &attempt_id)
        .await?;
    Ok(Json(view))
}

pub async fn start_section(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((attempt_id, section_type)): Path<(String, SectionType)>,
) -> Result<impl IntoResponse, ApiError> {
    let response = attempt_service(&state)
        .start_section(&claims, &attempt_id, section_type)
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SaveAnswersPayload {
    pub answers: HashMap<String, Answer>,
}

pub async fn save_answers(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((attempt_id, section_type)): Path<(String, SectionType)>,
    AppJson(payload): AppJson<SaveAnswersPayload>,
) -> Result<impl IntoResponse, ApiError> {
    attempt_service(&state)
        .save_answers(&claims, &attempt_id, section_type, payload.answers)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn end_section(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((attempt_id, section_type)): Path<(String, SectionType)>,
) -> Result<impl IntoResponse, ApiError> {
    let section = attempt_service(&state)
        .end_section(&claims, &attempt_id, section_type)
        .await?;
    Ok(Json(section))
}

pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let response = attempt_service(&state).submit(&claims, &attempt_id).await?;
    Ok(Json(response))
}

pub async fn rescore_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = attempt_service(&state)
        .rescore(&claims, &attempt_id)
        .await?;
    Ok(Json(report))
}
