// scheduling/src/services/appointments.rs
use std::sync::Arc;

use chrono::Utc;
use log::info;
use uuid::Uuid;

use models::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStats, NewAppointment, Role, Validate,
    ValidationError,
};
use security::{Action, Caller, ResourceKind, Scope, Target, list_scope};
use storage::EntityStore;

use crate::errors::{ServiceError, ServiceResult};
use crate::workflow::WorkflowEngine;
use crate::{authorize, require_participant};

#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn EntityStore>,
    workflow: WorkflowEngine,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn EntityStore>, workflow: WorkflowEngine) -> Self {
        AppointmentService { store, workflow }
    }

    /// Everything the caller may see: all for admins, otherwise the
    /// appointments they take part in.
    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<Appointment>> {
        authorize(caller, Action::List, Target::Kind(ResourceKind::Appointment))?;
        let filter = match list_scope(caller, ResourceKind::Appointment) {
            Scope::All => AppointmentFilter::default(),
            Scope::Patient(id) => AppointmentFilter::for_patient(id),
            Scope::Doctor(id) => AppointmentFilter::for_doctor(id),
        };
        Ok(self.store.list_appointments(&filter).await?)
    }

    pub async fn list_mine(&self, caller: &Caller) -> ServiceResult<Vec<Appointment>> {
        require_participant(caller)?;
        self.list(caller).await
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> ServiceResult<Appointment> {
        let appointment = self.load(id).await?;
        authorize(
            caller,
            Action::Read,
            Target::Appointment { appointment: &appointment, requested_status: None, edits_details: false },
        )?;
        Ok(appointment)
    }

    /// Books an appointment. Patients always book for themselves, whatever
    /// the payload says; an admin must name the patient.
    pub async fn create(&self, caller: &Caller, new: NewAppointment) -> ServiceResult<Appointment> {
        let draft = new.validate()?;
        authorize(caller, Action::Create, Target::Kind(ResourceKind::Appointment))?;

        let patient_id = if caller.is_patient() {
            caller.id
        } else {
            let patient_id = draft.patient_id.ok_or_else(|| ValidationError::missing(["patient_id"]))?;
            self.require_user(patient_id, Role::Patient, "patient", "patient_id").await?;
            patient_id
        };
        self.require_user(draft.doctor_id, Role::Doctor, "doctor", "doctor_id").await?;
        if self.store.get_facility(draft.facility_id).await?.is_none() {
            return Err(ServiceError::NotFound("facility"));
        }

        let appointment = Appointment::from_draft(draft, patient_id);
        self.store.insert_appointment(&appointment).await?;
        info!(
            "appointment {} booked for patient {} with doctor {}",
            appointment.id, appointment.patient_id, appointment.doctor_id
        );
        Ok(appointment)
    }

    async fn require_user(&self, id: Uuid, role: Role, kind: &'static str, field: &str) -> ServiceResult<()> {
        let user = self.store.get_user(id).await?.ok_or(ServiceError::NotFound(kind))?;
        if user.role != role {
            return Err(ValidationError::wrong_reference(field, role.as_str()).into());
        }
        Ok(())
    }

    pub async fn update(&self, caller: &Caller, id: Uuid, patch: AppointmentPatch) -> ServiceResult<Appointment> {
        let patch = patch.validate()?;
        self.workflow.update_appointment(caller, id, patch).await
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        let appointment = self.load(id).await?;
        authorize(
            caller,
            Action::Delete,
            Target::Appointment { appointment: &appointment, requested_status: None, edits_details: false },
        )?;
        self.store.delete_appointment(id).await?;
        info!("appointment {} deleted by {}", id, caller.id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Appointment> {
        self.store
            .get_appointment(id)
            .await?
            .ok_or(ServiceError::NotFound("appointment"))
    }

    pub async fn filter(&self, caller: &Caller, filter: AppointmentFilter) -> ServiceResult<Vec<Appointment>> {
        authorize(caller, Action::List, Target::Report(ResourceKind::Appointment))?;
        Ok(self.store.list_appointments(&filter).await?)
    }

    pub async fn stats(&self, caller: &Caller) -> ServiceResult<AppointmentStats> {
        authorize(caller, Action::List, Target::Report(ResourceKind::Appointment))?;
        let all = self.store.list_appointments(&AppointmentFilter::default()).await?;
        Ok(AppointmentStats::compute(&all, Utc::now()))
    }

    /// Confirmed appointments inside the reminder window that have not been reminded yet.
    pub async fn reminders_due(&self, caller: &Caller) -> ServiceResult<Vec<Appointment>> {
        authorize(caller, Action::List, Target::Report(ResourceKind::Appointment))?;
        let now = Utc::now();
        let due = self.store.list_appointments(&AppointmentFilter::reminders_due(now)).await?;
        Ok(due.into_iter().filter(|a| a.needs_reminder(now)).collect())
    }

    pub async fn mark_reminder_sent(&self, caller: &Caller, id: Uuid) -> ServiceResult<Appointment> {
        self.workflow.mark_reminder_sent(caller, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{World, caller_of};
    use chrono::Duration;
    use models::AppointmentStatus;

    #[tokio::test]
    async fn should_force_patient_id_for_patient_callers() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let other = w.user(Role::Patient).await;
        let facility = w.facility().await;

        let mut booking = w.booking(&doctor, facility);
        booking.patient_id = Some(other.id);
        let appt = w.services.appointments.create(&caller_of(&patient), booking).await.unwrap();
        assert_eq!(appt.patient_id, patient.id);
        assert_eq!(appt.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn should_require_doctor_role_for_doctor_id() {
        let w = World::new().await;
        let patient = w.user(Role::Patient).await;
        let not_a_doctor = w.user(Role::Patient).await;
        let facility = w.facility().await;

        let err = w
            .services
            .appointments
            .create(&caller_of(&patient), w.booking(&not_a_doctor, facility))
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(v) => assert_eq!(v.fields(), vec!["doctor_id"]),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn should_report_missing_facility() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let err = w
            .services
            .appointments
            .create(&caller_of(&patient), w.booking(&doctor, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("facility")));
    }

    #[tokio::test]
    async fn should_validate_before_authorizing() {
        let w = World::new().await;
        let doctor = w.user(Role::Doctor).await;
        let err = w
            .services
            .appointments
            .create(&caller_of(&doctor), NewAppointment::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn should_require_admin_to_name_patient() {
        let w = World::new().await;
        let doctor = w.user(Role::Doctor).await;
        let facility = w.facility().await;
        let err = w
            .services
            .appointments
            .create(&w.admin, w.booking(&doctor, facility))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn should_scope_listings_by_participant() {
        let w = World::new().await;
        let (p1, p2, doctor) = (w.user(Role::Patient).await, w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let facility = w.facility().await;
        let appts = &w.services.appointments;
        appts.create(&caller_of(&p1), w.booking(&doctor, facility)).await.unwrap();
        appts.create(&caller_of(&p2), w.booking(&doctor, facility)).await.unwrap();

        assert_eq!(appts.list(&caller_of(&p1)).await.unwrap().len(), 1);
        assert_eq!(appts.list_mine(&caller_of(&doctor)).await.unwrap().len(), 2);
        assert_eq!(appts.list(&w.admin).await.unwrap().len(), 2);
        assert!(matches!(appts.list_mine(&w.admin).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn should_hide_other_patients_appointment() {
        let w = World::new().await;
        let (p1, p2, doctor) = (w.user(Role::Patient).await, w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let facility = w.facility().await;
        let appt = w.services.appointments.create(&caller_of(&p1), w.booking(&doctor, facility)).await.unwrap();

        let err = w.services.appointments.get(&caller_of(&p2), appt.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Denied(_)));
        let err = w.services.appointments.get(&caller_of(&p2), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_list_reminders_and_mark_them_sent() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let facility = w.facility().await;
        let appts = &w.services.appointments;

        let mut soon = w.booking(&doctor, facility);
        soon.appointment_time = Some(Utc::now() + Duration::hours(5));
        let soon = appts.create(&caller_of(&patient), soon).await.unwrap();
        let later = appts.create(&caller_of(&patient), w.booking(&doctor, facility)).await.unwrap();
        for id in [soon.id, later.id] {
            let confirm = AppointmentPatch { status: Some(AppointmentStatus::Confirmed), ..Default::default() };
            appts.update(&caller_of(&doctor), id, confirm).await.unwrap();
        }

        let due = appts.reminders_due(&w.admin).await.unwrap();
        assert_eq!(due.iter().map(|a| a.id).collect::<Vec<_>>(), vec![soon.id]);
        assert!(matches!(appts.reminders_due(&caller_of(&doctor)).await, Err(ServiceError::Denied(_))));

        let marked = appts.mark_reminder_sent(&w.admin, soon.id).await.unwrap();
        assert!(marked.reminder_sent);
        assert!(appts.reminders_due(&w.admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_compute_stats_for_admin_only() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let facility = w.facility().await;
        w.services.appointments.create(&caller_of(&patient), w.booking(&doctor, facility)).await.unwrap();

        let stats = w.services.appointments.stats(&w.admin).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status.pending, 1);
        assert_eq!(stats.upcoming, 1);
        assert!(w.services.appointments.stats(&caller_of(&patient)).await.is_err());
    }

    #[tokio::test]
    async fn should_let_only_admin_delete() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let facility = w.facility().await;
        let appt = w.services.appointments.create(&caller_of(&patient), w.booking(&doctor, facility)).await.unwrap();

        let err = w.services.appointments.delete(&caller_of(&patient), appt.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Denied(_)));
        w.services.appointments.delete(&w.admin, appt.id).await.unwrap();
        assert!(w.store.get_appointment(appt.id).await.unwrap().is_none());
    }
}
