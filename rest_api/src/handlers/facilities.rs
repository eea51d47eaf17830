// rest_api/src/handlers/facilities.rs
// list, get and radius search are public; the rest need an admin token.

use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
};
use serde_json::Value;
use uuid::Uuid;

use models::{Facility, FacilityPatch, NewFacility};

use crate::AppState;
use crate::errors::ApiResult;
use crate::extract::Authenticated;
use crate::response::{Reply, created, deleted, listed, ok};

pub async fn list(State(state): State<AppState>) -> ApiResult<Reply<Vec<Facility>>> {
    Ok(listed(state.services.facilities.list().await?))
}

pub async fn get(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Reply<Facility>> {
    let Path(id) = id?;
    Ok(ok(state.services.facilities.get(id).await?))
}

pub async fn within_radius(
    State(state): State<AppState>,
    params: Result<Path<(f64, f64, f64)>, PathRejection>,
) -> ApiResult<Reply<Vec<Facility>>> {
    let Path((latitude, longitude, distance_km)) = params?;
    Ok(listed(state.services.facilities.within_radius(latitude, longitude, distance_km).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<NewFacility>, JsonRejection>,
) -> ApiResult<(StatusCode, Reply<Facility>)> {
    let Json(new) = payload?;
    Ok(created(state.services.facilities.create(&caller, new).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<FacilityPatch>, JsonRejection>,
) -> ApiResult<Reply<Facility>> {
    let (Path(id), Json(patch)) = (id?, payload?);
    Ok(ok(state.services.facilities.update(&caller, id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<Value>> {
    let Path(id) = id?;
    state.services.facilities.delete(&caller, id).await?;
    Ok(deleted())
}
