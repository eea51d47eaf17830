// rest_api/src/handlers/consultations.rs

use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
};
use serde_json::Value;
use uuid::Uuid;

use models::{Consultation, ConsultationPatch, NewConsultation};

use crate::AppState;
use crate::errors::ApiResult;
use crate::extract::Authenticated;
use crate::response::{Reply, created, deleted, listed, ok};

pub async fn list(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<Vec<Consultation>>> {
    Ok(listed(state.services.consultations.list(&caller).await?))
}

pub async fn mine(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<Vec<Consultation>>> {
    Ok(listed(state.services.consultations.list_mine(&caller).await?))
}

/// Records the consultation and completes its appointment in one step.
pub async fn create(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<NewConsultation>, JsonRejection>,
) -> ApiResult<(StatusCode, Reply<Consultation>)> {
    let Json(new) = payload?;
    Ok(created(state.services.consultations.create(&caller, new).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<Consultation>> {
    let Path(id) = id?;
    Ok(ok(state.services.consultations.get(&caller, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ConsultationPatch>, JsonRejection>,
) -> ApiResult<Reply<Consultation>> {
    let (Path(id), Json(patch)) = (id?, payload?);
    Ok(ok(state.services.consultations.update(&caller, id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<Value>> {
    let Path(id) = id?;
    state.services.consultations.delete(&caller, id).await?;
    Ok(deleted())
}
