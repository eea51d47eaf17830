// scheduling/src/services/prescriptions.rs
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use models::{NewPrescription, Prescription, PrescriptionFilter, PrescriptionPatch, Validate, ValidationError};
use security::{Action, Caller, ResourceKind, Scope, Target, list_scope};
use storage::EntityStore;

use crate::errors::{ServiceError, ServiceResult};
use crate::workflow::WorkflowEngine;
use crate::{authorize, require_participant};

#[derive(Clone)]
pub struct PrescriptionService {
    store: Arc<dyn EntityStore>,
    workflow: WorkflowEngine,
}

impl PrescriptionService {
    pub fn new(store: Arc<dyn EntityStore>, workflow: WorkflowEngine) -> Self {
        PrescriptionService { store, workflow }
    }

    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<Prescription>> {
        authorize(caller, Action::List, Target::Kind(ResourceKind::Prescription))?;
        let filter = match list_scope(caller, ResourceKind::Prescription) {
            Scope::All => PrescriptionFilter::default(),
            Scope::Patient(id) => PrescriptionFilter::for_patient(id),
            Scope::Doctor(id) => PrescriptionFilter::for_doctor(id),
        };
        Ok(self.store.list_prescriptions(&filter).await?)
    }

    pub async fn list_mine(&self, caller: &Caller) -> ServiceResult<Vec<Prescription>> {
        require_participant(caller)?;
        self.list(caller).await
    }

    /// Prescriptions of one patient with no end date or one still ahead.
    pub async fn active_for_patient(&self, caller: &Caller, patient_id: Uuid) -> ServiceResult<Vec<Prescription>> {
        if self.store.get_user(patient_id).await?.is_none() {
            return Err(ServiceError::NotFound("patient"));
        }
        authorize(caller, Action::Read, Target::PatientRecords(patient_id))?;
        let filter = PrescriptionFilter { active_at: Some(Utc::now()), ..PrescriptionFilter::for_patient(patient_id) };
        Ok(self.store.list_prescriptions(&filter).await?)
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> ServiceResult<Prescription> {
        let prescription = self.load(id).await?;
        authorize(caller, Action::Read, Target::Prescription(&prescription))?;
        Ok(prescription)
    }

    /// Writes a prescription in the caller's name.
    ///
    /// A `consultation_id` in the payload must name a consultation the caller
    /// may edit, about the same patient; both are checked before anything is
    /// written. The back-link itself is a second write whose failure is
    /// logged, not fatal.
    pub async fn create(&self, caller: &Caller, new: NewPrescription) -> ServiceResult<Prescription> {
        let mut draft = new.validate()?;
        authorize(caller, Action::Create, Target::Kind(ResourceKind::Prescription))?;

        let patient = self
            .store
            .get_user(draft.patient_id)
            .await?
            .ok_or(ServiceError::NotFound("patient"))?;
        if !patient.is_patient() {
            return Err(ValidationError::wrong_reference("patient_id", "Patient").into());
        }

        let consultation_id = draft.consultation_id.take();
        if let Some(consultation_id) = consultation_id {
            self.check_back_link(caller, consultation_id, patient.id).await?;
        }
        let prescription = Prescription::from_draft(draft, caller.id);
        self.store.insert_prescription(&prescription).await?;
        info!("prescription {} written by {} for patient {}", prescription.id, caller.id, patient.id);

        if let Some(consultation_id) = consultation_id {
            if let Err(e) = self.store.link_prescription(consultation_id, prescription.id).await {
                warn!(
                    "prescription {} saved but not linked to consultation {}: {}",
                    prescription.id, consultation_id, e
                );
            }
        }
        Ok(prescription)
    }

    pub async fn update(&self, caller: &Caller, id: Uuid, patch: PrescriptionPatch) -> ServiceResult<Prescription> {
        let patch = patch.validate()?;
        let mut prescription = self.load(id).await?;
        authorize(caller, Action::Update, Target::Prescription(&prescription))?;

        prescription.apply_patch(patch)?;
        self.store.update_prescription(&prescription).await?;
        Ok(prescription)
    }

    /// Deletes the prescription and clears it from any consultation citing it.
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        self.workflow.delete_prescription(caller, id).await
    }

    async fn check_back_link(&self, caller: &Caller, consultation_id: Uuid, patient_id: Uuid) -> ServiceResult<()> {
        let consultation = self
            .store
            .get_consultation(consultation_id)
            .await?
            .ok_or(ServiceError::NotFound("consultation"))?;
        let appointment = self.workflow.authorize_consultation(caller, Action::Update, &consultation).await?;
        match appointment {
            Some(appointment) if appointment.patient_id != patient_id => {
                Err(ValidationError::invalid("consultation_id", "concerns another patient").into())
            }
            _ => Ok(()),
        }
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Prescription> {
        self.store
            .get_prescription(id)
            .await?
            .ok_or(ServiceError::NotFound("prescription"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{World, caller_of};
    use chrono::Duration;
    use models::{AppointmentPatch, AppointmentStatus, Consultation, NewConsultation, Role, User};

    fn script(patient: &User) -> NewPrescription {
        NewPrescription {
            patient_id: Some(patient.id),
            medication: Some("Ibuprofen".into()),
            dosage: Some("400mg".into()),
            instructions: Some("with food, up to three times daily".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn should_prescribe_in_callers_name() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let rx = w.services.prescriptions.create(&caller_of(&doctor), script(&patient)).await.unwrap();
        assert_eq!(rx.doctor_id, doctor.id);
        assert_eq!(rx.refills, 0);

        let err = w.services.prescriptions.create(&caller_of(&patient), script(&patient)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Denied(_)));
    }

    #[tokio::test]
    async fn should_require_patient_reference() {
        let w = World::new().await;
        let (doctor, colleague) = (w.user(Role::Doctor).await, w.user(Role::Doctor).await);
        let err = w.services.prescriptions.create(&caller_of(&doctor), script(&colleague)).await.unwrap_err();
        match err {
            ServiceError::Validation(v) => assert_eq!(v.fields(), vec!["patient_id"]),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn should_list_active_for_allowed_callers() {
        let w = World::new().await;
        let (patient, other, doctor) = (w.user(Role::Patient).await, w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let rx = &w.services.prescriptions;
        let ongoing = rx.create(&caller_of(&doctor), script(&patient)).await.unwrap();
        let mut finished = script(&patient);
        finished.start_date = Some(Utc::now() - Duration::days(20));
        finished.end_date = Some(Utc::now() - Duration::days(10));
        rx.create(&caller_of(&doctor), finished).await.unwrap();

        let active = rx.active_for_patient(&caller_of(&patient), patient.id).await.unwrap();
        assert_eq!(active.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ongoing.id]);
        assert_eq!(rx.active_for_patient(&caller_of(&w.user(Role::Doctor).await), patient.id).await.unwrap().len(), 1);
        assert!(matches!(
            rx.active_for_patient(&caller_of(&other), patient.id).await,
            Err(ServiceError::Denied(_))
        ));
        assert!(matches!(
            rx.active_for_patient(&w.admin, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_let_only_prescriber_edit() {
        let w = World::new().await;
        let (patient, doctor, colleague) = (w.user(Role::Patient).await, w.user(Role::Doctor).await, w.user(Role::Doctor).await);
        let rx = w.services.prescriptions.create(&caller_of(&doctor), script(&patient)).await.unwrap();

        let patch = PrescriptionPatch { refills: Some(2), ..Default::default() };
        assert!(matches!(
            w.services.prescriptions.update(&caller_of(&colleague), rx.id, patch.clone()).await,
            Err(ServiceError::Denied(_))
        ));
        let updated = w.services.prescriptions.update(&caller_of(&doctor), rx.id, patch).await.unwrap();
        assert_eq!(updated.refills, 2);

        let backwards = PrescriptionPatch { end_date: Some(Some(rx.start_date - Duration::days(1))), ..Default::default() };
        assert!(matches!(
            w.services.prescriptions.update(&caller_of(&doctor), rx.id, backwards).await,
            Err(ServiceError::Validation(_))
        ));
    }

    async fn consultation(w: &World, patient: &User, doctor: &User) -> Consultation {
        let facility = w.facility().await;
        let appt = w
            .services
            .appointments
            .create(&caller_of(patient), w.booking(doctor, facility))
            .await
            .unwrap();
        let confirm = AppointmentPatch { status: Some(AppointmentStatus::Confirmed), ..Default::default() };
        w.services.appointments.update(&caller_of(doctor), appt.id, confirm).await.unwrap();
        w.services
            .consultations
            .create(
                &caller_of(doctor),
                NewConsultation {
                    appointment_id: Some(appt.id),
                    notes: Some("sprained ankle".into()),
                    diagnosis: Some("grade I sprain".into()),
                    prescription_id: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn should_link_to_consultation_and_unlink_on_delete() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let consultation = consultation(&w, &patient, &doctor).await;

        let mut new = script(&patient);
        new.consultation_id = Some(consultation.id);
        let rx = w.services.prescriptions.create(&caller_of(&doctor), new).await.unwrap();
        let linked = w.store.get_consultation(consultation.id).await.unwrap().unwrap();
        assert_eq!(linked.prescription_id, Some(rx.id));

        assert!(matches!(
            w.services.prescriptions.delete(&caller_of(&doctor), rx.id).await,
            Err(ServiceError::Denied(_))
        ));
        w.services.prescriptions.delete(&w.admin, rx.id).await.unwrap();
        let unlinked = w.store.get_consultation(consultation.id).await.unwrap().unwrap();
        assert_eq!(unlinked.prescription_id, None);
    }

    #[tokio::test]
    async fn should_reject_back_link_to_unknown_consultation() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let mut new = script(&patient);
        new.consultation_id = Some(Uuid::new_v4());

        let err = w.services.prescriptions.create(&caller_of(&doctor), new).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("consultation")));
        assert!(w.store.list_prescriptions(&PrescriptionFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_deny_back_link_to_another_doctors_consultation() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let (bystander, stranger) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let consultation = consultation(&w, &patient, &doctor).await;

        let mut new = script(&bystander);
        new.consultation_id = Some(consultation.id);
        let err = w.services.prescriptions.create(&caller_of(&stranger), new).await.unwrap_err();
        assert!(matches!(err, ServiceError::Denied(_)), "got {:?}", err);

        let mut new = script(&patient);
        new.consultation_id = Some(consultation.id);
        let err = w.services.prescriptions.create(&caller_of(&stranger), new).await.unwrap_err();
        assert!(matches!(err, ServiceError::Denied(_)), "got {:?}", err);

        assert!(w.store.list_prescriptions(&PrescriptionFilter::default()).await.unwrap().is_empty());
        let untouched = w.store.get_consultation(consultation.id).await.unwrap().unwrap();
        assert_eq!(untouched.prescription_id, None);
    }

    #[tokio::test]
    async fn should_reject_back_link_for_another_patient() {
        let w = World::new().await;
        let (patient, doctor, bystander) =
            (w.user(Role::Patient).await, w.user(Role::Doctor).await, w.user(Role::Patient).await);
        let consultation = consultation(&w, &patient, &doctor).await;

        let mut new = script(&bystander);
        new.consultation_id = Some(consultation.id);
        let err = w.services.prescriptions.create(&caller_of(&doctor), new).await.unwrap_err();
        match err {
            ServiceError::Validation(v) => assert_eq!(v.fields(), vec!["consultation_id"]),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(w.store.list_prescriptions(&PrescriptionFilter::for_patient(bystander.id)).await.unwrap().is_empty());
        assert_eq!(w.store.get_consultation(consultation.id).await.unwrap().unwrap().prescription_id, None);
    }
}
