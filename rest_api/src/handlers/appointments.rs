// rest_api/src/handlers/appointments.rs
// Appointments are always returned with their derived flags (is_upcoming, needs_reminder).

use axum::{
    Json,
    extract::{Path, Query, State, rejection::{JsonRejection, PathRejection, QueryRejection}},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use models::{Appointment, AppointmentFilter, AppointmentPatch, AppointmentStats, AppointmentStatus, AppointmentView, NewAppointment};

use crate::AppState;
use crate::errors::ApiResult;
use crate::extract::Authenticated;
use crate::response::{Reply, created, deleted, listed, ok};

fn view(appointment: Appointment) -> AppointmentView {
    AppointmentView::at(appointment, Utc::now())
}

fn views(appointments: Vec<Appointment>) -> Reply<Vec<AppointmentView>> {
    let now = Utc::now();
    listed(appointments.into_iter().map(|a| AppointmentView::at(a, now)).collect())
}

/// Query string of `GET /appointments/filter`.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub status: Option<AppointmentStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub facility_id: Option<Uuid>,
}

impl From<FilterQuery> for AppointmentFilter {
    fn from(q: FilterQuery) -> Self {
        AppointmentFilter {
            status: q.status,
            start_date: q.start_date,
            end_date: q.end_date,
            patient_id: q.patient_id,
            doctor_id: q.doctor_id,
            facility_id: q.facility_id,
            ..Default::default()
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<Vec<AppointmentView>>> {
    Ok(views(state.services.appointments.list(&caller).await?))
}

pub async fn mine(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<Vec<AppointmentView>>> {
    Ok(views(state.services.appointments.list_mine(&caller).await?))
}

pub async fn filter(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    query: Result<Query<FilterQuery>, QueryRejection>,
) -> ApiResult<Reply<Vec<AppointmentView>>> {
    let Query(query) = query?;
    Ok(views(state.services.appointments.filter(&caller, query.into()).await?))
}

pub async fn stats(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<AppointmentStats>> {
    Ok(ok(state.services.appointments.stats(&caller).await?))
}

pub async fn reminders(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Reply<Vec<AppointmentView>>> {
    Ok(views(state.services.appointments.reminders_due(&caller).await?))
}

pub async fn reminder_sent(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<AppointmentView>> {
    let Path(id) = id?;
    Ok(ok(view(state.services.appointments.mark_reminder_sent(&caller, id).await?)))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<NewAppointment>, JsonRejection>,
) -> ApiResult<(StatusCode, Reply<AppointmentView>)> {
    let Json(new) = payload?;
    Ok(created(view(state.services.appointments.create(&caller, new).await?)))
}

pub async fn get(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<AppointmentView>> {
    let Path(id) = id?;
    Ok(ok(view(state.services.appointments.get(&caller, id).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AppointmentPatch>, JsonRejection>,
) -> ApiResult<Reply<AppointmentView>> {
    let (Path(id), Json(patch)) = (id?, payload?);
    Ok(ok(view(state.services.appointments.update(&caller, id, patch).await?)))
}

pub async fn delete(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Reply<Value>> {
    let Path(id) = id?;
    state.services.appointments.delete(&caller, id).await?;
    Ok(deleted())
}
