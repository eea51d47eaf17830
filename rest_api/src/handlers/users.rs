// rest_api/src/handlers/users.rs

use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
};
use serde_json::Value;
use uuid::Uuid;

use models::{NewUser, PublicUser, UserPatch};

use crate::AppState;
use crate::errors::ApiResult;
use crate::extract::Authenticated;
use crate::response::{Reply, created, deleted, listed, ok};

pub async fn list(State(state): State<AppState>, Authenticated(caller): Authenticated) -> ApiResult<Reply<Vec<PublicUser>>> {
    Ok(listed(state.services.users.list(&caller).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<PublicUser>> {
    let Path(id) = id?;
    Ok(ok(state.services.users.get(&caller, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Reply<PublicUser>)> {
    let Json(new) = payload?;
    Ok(created(state.services.users.create(&caller, new).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Reply<PublicUser>> {
    let (Path(id), Json(patch)) = (id?, payload?);
    Ok(ok(state.services.users.update(&caller, id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<Value>> {
    let Path(id) = id?;
    state.services.users.delete(&caller, id).await?;
    Ok(deleted())
}
