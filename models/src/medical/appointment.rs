// models/src/medical/appointment.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::validation::{is_blank, not_blank_if_present, require, Validate};

/// How far ahead a confirmed appointment becomes due for a reminder.
pub const REMINDER_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
    ];

    /// Cancelled and Completed accept no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Completed => "Completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub facility_id: Uuid,
    pub status: AppointmentStatus,
    pub appointment_time: DateTime<Utc>,
    pub reason: String,
    pub notes: Option<String>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// A new booking always starts out Pending.
    pub fn from_draft(draft: AppointmentDraft, patient_id: Uuid) -> Self {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: draft.doctor_id,
            facility_id: draft.facility_id,
            status: AppointmentStatus::Pending,
            appointment_time: draft.appointment_time,
            reason: draft.reason,
            notes: draft.notes,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.appointment_time > now && self.status != AppointmentStatus::Cancelled
    }

    pub fn needs_reminder(&self, now: DateTime<Utc>) -> bool {
        let until = self.appointment_time - now;
        !self.reminder_sent
            && self.status == AppointmentStatus::Confirmed
            && until > Duration::zero()
            && until <= Duration::hours(REMINDER_WINDOW_HOURS)
    }

    /// Copies every non-status field of the patch. Status goes through the workflow engine.
    pub fn apply_fields(&mut self, patch: &AppointmentPatch) {
        if let Some(appointment_time) = patch.appointment_time {
            self.appointment_time = appointment_time;
        }
        if let Some(ref reason) = patch.reason {
            self.reason = reason.trim().to_string();
        }
        if patch.notes.is_some() {
            self.notes = patch.notes.clone();
        }
        if let Some(reminder_sent) = patch.reminder_sent {
            self.reminder_sent = reminder_sent;
        }
        self.updated_at = Utc::now();
    }
}

/// An appointment as handed to API callers, with its derived flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub is_upcoming: bool,
    pub needs_reminder: bool,
}

impl AppointmentView {
    pub fn at(appointment: Appointment, now: DateTime<Utc>) -> Self {
        AppointmentView {
            is_upcoming: appointment.is_upcoming(now),
            needs_reminder: appointment.needs_reminder(now),
            appointment,
        }
    }
}

// --- Payloads ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    /// Ignored for patient callers, who always book for themselves.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub facility_id: Option<Uuid>,
    pub appointment_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDraft {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub facility_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub reason: String,
    pub notes: Option<String>,
}

impl Validate for NewAppointment {
    type Valid = AppointmentDraft;

    fn validate(self) -> ValidationResult<AppointmentDraft> {
        require(&[
            ("doctor_id", self.doctor_id.is_none()),
            ("facility_id", self.facility_id.is_none()),
            ("appointment_time", self.appointment_time.is_none()),
            ("reason", is_blank(&self.reason)),
        ])?;
        let (Some(doctor_id), Some(facility_id), Some(appointment_time), Some(reason)) =
            (self.doctor_id, self.facility_id, self.appointment_time, self.reason)
        else {
            return Err(ValidationError::missing(["doctor_id", "facility_id", "appointment_time", "reason"]));
        };
        Ok(AppointmentDraft {
            patient_id: self.patient_id,
            doctor_id,
            facility_id,
            appointment_time,
            reason: reason.trim().to_string(),
            notes: self.notes,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentPatch {
    pub status: Option<AppointmentStatus>,
    pub appointment_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub reminder_sent: Option<bool>,
}

impl AppointmentPatch {
    /// Whether the patch touches anything besides status.
    pub fn edits_details(&self) -> bool {
        self.appointment_time.is_some()
            || self.reason.is_some()
            || self.notes.is_some()
            || self.reminder_sent.is_some()
    }
}

impl Validate for AppointmentPatch {
    type Valid = AppointmentPatch;

    fn validate(self) -> ValidationResult<AppointmentPatch> {
        not_blank_if_present("reason", &self.reason)?;
        Ok(self)
    }
}

// --- Queries ---

/// Persistence-level filter. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub statuses: Option<Vec<AppointmentStatus>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub facility_id: Option<Uuid>,
    pub reminder_sent: Option<bool>,
}

impl AppointmentFilter {
    pub fn for_patient(patient_id: Uuid) -> Self {
        AppointmentFilter { patient_id: Some(patient_id), ..Default::default() }
    }

    pub fn for_doctor(doctor_id: Uuid) -> Self {
        AppointmentFilter { doctor_id: Some(doctor_id), ..Default::default() }
    }

    /// Confirmed, not yet reminded, starting within the reminder window.
    pub fn reminders_due(now: DateTime<Utc>) -> Self {
        AppointmentFilter {
            status: Some(AppointmentStatus::Confirmed),
            start_date: Some(now),
            end_date: Some(now + Duration::hours(REMINDER_WINDOW_HOURS)),
            reminder_sent: Some(false),
            ..Default::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.status.map_or(true, |s| appointment.status == s)
            && self.statuses.as_ref().map_or(true, |set| set.contains(&appointment.status))
            && self.start_date.map_or(true, |t| appointment.appointment_time >= t)
            && self.end_date.map_or(true, |t| appointment.appointment_time <= t)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.facility_id.map_or(true, |id| appointment.facility_id == id)
            && self.reminder_sent.map_or(true, |r| appointment.reminder_sent == r)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub total: usize,
    pub by_status: StatusCounts,
    pub today: usize,
    pub upcoming: usize,
    pub need_attention: usize,
}

impl AppointmentStats {
    /// Dashboard counters relative to the UTC day containing `now`.
    pub fn compute(appointments: &[Appointment], now: DateTime<Utc>) -> Self {
        let today = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        let tomorrow = today + Duration::days(1);
        let next_week = today + Duration::days(7);

        let mut stats = AppointmentStats { total: appointments.len(), ..Default::default() };
        for a in appointments {
            match a.status {
                AppointmentStatus::Pending => stats.by_status.pending += 1,
                AppointmentStatus::Confirmed => stats.by_status.confirmed += 1,
                AppointmentStatus::Cancelled => stats.by_status.cancelled += 1,
                AppointmentStatus::Completed => stats.by_status.completed += 1,
            }
            let t = a.appointment_time;
            if t >= today && t < tomorrow {
                stats.today += 1;
                if a.status == AppointmentStatus::Pending {
                    stats.need_attention += 1;
                }
            }
            if t >= today && t < next_week && !a.status.is_terminal() {
                stats.upcoming += 1;
            }
        }
        stats
    }
}
