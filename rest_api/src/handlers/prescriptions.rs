// rest_api/src/handlers/prescriptions.rs

use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use models::{NewPrescription, Prescription, PrescriptionPatch, PrescriptionView};

use crate::AppState;
use crate::errors::ApiResult;
use crate::extract::Authenticated;
use crate::response::{Reply, created, deleted, listed, ok};

fn view(prescription: Prescription) -> PrescriptionView {
    PrescriptionView::at(prescription, Utc::now())
}

fn views(prescriptions: Vec<Prescription>) -> Reply<Vec<PrescriptionView>> {
    let now = Utc::now();
    listed(prescriptions.into_iter().map(|p| PrescriptionView::at(p, now)).collect())
}

pub async fn list(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<Vec<PrescriptionView>>> {
    Ok(views(state.services.prescriptions.list(&caller).await?))
}

pub async fn mine(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<Vec<PrescriptionView>>> {
    Ok(views(state.services.prescriptions.list_mine(&caller).await?))
}

pub async fn active(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    patient_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<Vec<PrescriptionView>>> {
    let Path(patient_id) = patient_id?;
    Ok(views(state.services.prescriptions.active_for_patient(&caller, patient_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<NewPrescription>, JsonRejection>,
) -> ApiResult<(StatusCode, Reply<PrescriptionView>)> {
    let Json(new) = payload?;
    Ok(created(view(state.services.prescriptions.create(&caller, new).await?)))
}

pub async fn get(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<PrescriptionView>> {
    let Path(id) = id?;
    Ok(ok(view(state.services.prescriptions.get(&caller, id).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PrescriptionPatch>, JsonRejection>,
) -> ApiResult<Reply<PrescriptionView>> {
    let (Path(id), Json(patch)) = (id?, payload?);
    Ok(ok(view(state.services.prescriptions.update(&caller, id, patch).await?)))
}

/// Admin only. Also clears the prescription from any consultation citing it.
pub async fn delete(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<Value>> {
    let Path(id) = id?;
    state.services.prescriptions.delete(&caller, id).await?;
    Ok(deleted())
}
