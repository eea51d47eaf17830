// rest_api/src/handlers/medical_profiles.rs

use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
};
use serde_json::Value;
use uuid::Uuid;

use models::{MedicalProfile, MedicalProfilePatch, NewMedicalProfile};

use crate::AppState;
use crate::errors::ApiResult;
use crate::extract::Authenticated;
use crate::response::{Reply, created, deleted, listed, ok};

pub async fn list(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<Vec<MedicalProfile>>> {
    Ok(listed(state.services.profiles.list(&caller).await?))
}

pub async fn mine(State(state): State<AppState>, Authenticated(caller): Authenticated) -> ApiResult<Reply<MedicalProfile>> {
    Ok(ok(state.services.profiles.mine(&caller).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<NewMedicalProfile>, JsonRejection>,
) -> ApiResult<(StatusCode, Reply<MedicalProfile>)> {
    let Json(new) = payload?;
    Ok(created(state.services.profiles.create(&caller, new).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<MedicalProfile>> {
    let Path(id) = id?;
    Ok(ok(state.services.profiles.get(&caller, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<MedicalProfilePatch>, JsonRejection>,
) -> ApiResult<Reply<MedicalProfile>> {
    let (Path(id), Json(patch)) = (id?, payload?);
    Ok(ok(state.services.profiles.update(&caller, id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<Value>> {
    let Path(id) = id?;
    state.services.profiles.delete(&caller, id).await?;
    Ok(deleted())
}
