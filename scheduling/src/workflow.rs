// scheduling/src/workflow.rs
//! Appointment state machine and the cross-record cascades.
//!
//! ```text
//! Pending ──confirm──▶ Confirmed ──consultation──▶ Completed
//!    │                     │
//!    └──────cancel─────────┴──────▶ Cancelled
//! ```
//!
//! Completed is only reached through [`WorkflowEngine::create_consultation`];
//! a client can never ask for it directly.

use std::sync::Arc;

use chrono::Utc;
use log::info;
use uuid::Uuid;

use models::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus, Consultation, ConsultationDraft,
    PrescriptionFilter, Role, ValidationError,
};
use security::{Action, Caller, ResourceKind, Target};
use storage::EntityStore;

use crate::authorize;
use crate::errors::{ServiceError, ServiceResult};

/// Whether `role` may move an appointment from `from` to `to`.
///
/// Asking for the current status of a live appointment is a no-op and allowed;
/// terminal appointments accept nothing.
pub fn check_transition(role: Role, from: AppointmentStatus, to: AppointmentStatus) -> ServiceResult<()> {
    use AppointmentStatus::*;

    let legal = match (from, to) {
        (from, to) if from == to => !from.is_terminal(),
        (Pending, Confirmed) => matches!(role, Role::Doctor | Role::Admin),
        (Pending | Confirmed, Cancelled) => true,
        _ => false,
    };
    if legal {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition { from, to })
    }
}

#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn EntityStore>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        WorkflowEngine { store }
    }

    async fn load_appointment(&self, id: Uuid) -> ServiceResult<Appointment> {
        self.store
            .get_appointment(id)
            .await?
            .ok_or(ServiceError::NotFound("appointment"))
    }

    /// Applies a checked patch to an appointment, status included.
    ///
    /// Authorization runs before transition legality. The write is conditional
    /// on the status read here, so a concurrent status change makes this call
    /// fail with `Conflict` instead of overwriting it.
    pub async fn update_appointment(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> ServiceResult<Appointment> {
        let mut appointment = self.load_appointment(id).await?;
        authorize(
            caller,
            Action::Update,
            Target::Appointment {
                appointment: &appointment,
                requested_status: patch.status,
                edits_details: patch.edits_details(),
            },
        )?;

        let expected = appointment.status;
        if let Some(to) = patch.status {
            check_transition(caller.role, expected, to)?;
        }
        appointment.apply_fields(&patch);
        if let Some(to) = patch.status {
            appointment.status = to;
        }

        self.store.update_appointment(&appointment, expected).await?;
        if appointment.status != expected {
            info!("appointment {} moved {} -> {} by {} {}", id, expected, appointment.status, caller.role, caller.id);
        }
        Ok(appointment)
    }

    /// Records the consultation for a Confirmed appointment and completes the
    /// appointment in the same store transaction.
    pub async fn create_consultation(&self, caller: &Caller, draft: ConsultationDraft) -> ServiceResult<Consultation> {
        let mut appointment = self.load_appointment(draft.appointment_id).await?;
        authorize(caller, Action::Create, Target::Consultation { appointment: &appointment })?;

        let existing = self.store.get_consultation_by_appointment(appointment.id).await?;
        if appointment.status != AppointmentStatus::Confirmed {
            // A Completed appointment with a consultation means we lost a race
            // (or are repeating one), which the caller should see as a conflict.
            if existing.is_some() {
                return Err(duplicate_consultation(appointment.id));
            }
            return Err(ServiceError::InvalidState(format!(
                "appointment is {}, a consultation needs a Confirmed appointment",
                appointment.status
            )));
        }
        if existing.is_some() {
            return Err(duplicate_consultation(appointment.id));
        }
        if let Some(prescription_id) = draft.prescription_id {
            self.require_prescription_of(prescription_id, appointment.patient_id).await?;
        }

        let consultation = Consultation::from_draft(draft);
        appointment.status = AppointmentStatus::Completed;
        appointment.updated_at = Utc::now();
        self.store
            .commit_consultation(&consultation, &appointment, AppointmentStatus::Confirmed)
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => duplicate_consultation(appointment.id),
                other => other,
            })?;

        info!(
            "consultation {} recorded, appointment {} completed by doctor {}",
            consultation.id, appointment.id, caller.id
        );
        Ok(consultation)
    }

    /// Authorizes `action` on a consultation through its parent appointment,
    /// which is handed back when it still exists.
    ///
    /// An orphaned consultation (its appointment deleted) has no participants
    /// left, so only an administrator can reach it.
    pub async fn authorize_consultation(
        &self,
        caller: &Caller,
        action: Action,
        consultation: &Consultation,
    ) -> ServiceResult<Option<Appointment>> {
        match self.store.get_appointment(consultation.appointment_id).await? {
            Some(appointment) => {
                authorize(caller, action, Target::Consultation { appointment: &appointment })?;
                Ok(Some(appointment))
            }
            None if caller.is_admin() => Ok(None),
            None => Err(ServiceError::Denied("not a participant in this record".to_string())),
        }
    }

    /// A consultation may only cite a prescription written for the patient it
    /// concerns. The store re-checks existence when it writes the link.
    pub async fn require_prescription_of(&self, prescription_id: Uuid, patient_id: Uuid) -> ServiceResult<()> {
        let prescription = self
            .store
            .get_prescription(prescription_id)
            .await?
            .ok_or(ServiceError::NotFound("prescription"))?;
        if prescription.patient_id != patient_id {
            return Err(ValidationError::invalid("prescription_id", "belongs to another patient").into());
        }
        Ok(())
    }

    /// Deletes a prescription and clears it from every consultation that
    /// referenced it.
    pub async fn delete_prescription(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        let prescription = self
            .store
            .get_prescription(id)
            .await?
            .ok_or(ServiceError::NotFound("prescription"))?;
        authorize(caller, Action::Delete, Target::Prescription(&prescription))?;

        let unlinked = self.store.delete_prescription(id).await?;
        info!("prescription {} deleted, unlinked from {} consultation(s)", id, unlinked);
        Ok(())
    }

    /// Deletes a user. A patient's medical profile goes with them in the same
    /// store write; a doctor still named on appointments or prescriptions
    /// cannot be removed.
    pub async fn delete_user(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        let user = self.store.get_user(id).await?.ok_or(ServiceError::NotFound("user"))?;
        authorize(caller, Action::Delete, Target::User(user.id))?;

        if user.role == Role::Doctor {
            let appointments = self.store.list_appointments(&AppointmentFilter::for_doctor(id)).await?;
            let prescriptions = self.store.list_prescriptions(&PrescriptionFilter::for_doctor(id)).await?;
            if !appointments.is_empty() || !prescriptions.is_empty() {
                return Err(ServiceError::InvalidState(format!(
                    "doctor is still referenced by {} appointment(s) and {} prescription(s)",
                    appointments.len(),
                    prescriptions.len()
                )));
            }
        }

        if self.store.delete_user(id).await? {
            info!("medical profile of {} deleted with the account", id);
        }
        info!("user {} ({}) deleted by {}", id, user.role, caller.id);
        Ok(())
    }

    /// Admin-only: flags an appointment's reminder as delivered.
    pub async fn mark_reminder_sent(&self, caller: &Caller, id: Uuid) -> ServiceResult<Appointment> {
        let mut appointment = self.load_appointment(id).await?;
        authorize(caller, Action::Update, Target::Report(ResourceKind::Appointment))?;

        let expected = appointment.status;
        appointment.reminder_sent = true;
        appointment.updated_at = Utc::now();
        self.store.update_appointment(&appointment, expected).await?;
        Ok(appointment)
    }
}

fn duplicate_consultation(appointment_id: Uuid) -> ServiceError {
    ServiceError::Conflict(format!("a consultation already exists for appointment {}", appointment_id))
}
