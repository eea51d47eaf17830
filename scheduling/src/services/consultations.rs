// scheduling/src/services/consultations.rs
use std::sync::Arc;

use log::info;
use uuid::Uuid;

use models::{
    AppointmentFilter, Consultation, ConsultationFilter, ConsultationPatch, NewConsultation, Validate,
};
use security::{Action, Caller, ResourceKind, Scope, Target, list_scope};
use storage::EntityStore;

use crate::errors::{ServiceError, ServiceResult};
use crate::workflow::WorkflowEngine;
use crate::{authorize, require_participant};

#[derive(Clone)]
pub struct ConsultationService {
    store: Arc<dyn EntityStore>,
    workflow: WorkflowEngine,
}

impl ConsultationService {
    pub fn new(store: Arc<dyn EntityStore>, workflow: WorkflowEngine) -> Self {
        ConsultationService { store, workflow }
    }

    /// Consultations are scoped through their appointments: a caller sees
    /// those attached to appointments they take part in.
    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<Consultation>> {
        authorize(caller, Action::List, Target::Kind(ResourceKind::Consultation))?;
        let appointments = match list_scope(caller, ResourceKind::Consultation) {
            Scope::All => return Ok(self.store.list_consultations(&ConsultationFilter::default()).await?),
            Scope::Patient(id) => AppointmentFilter::for_patient(id),
            Scope::Doctor(id) => AppointmentFilter::for_doctor(id),
        };
        let ids = self.store.list_appointments(&appointments).await?.into_iter().map(|a| a.id).collect();
        Ok(self.store.list_consultations(&ConsultationFilter::for_appointments(ids)).await?)
    }

    pub async fn list_mine(&self, caller: &Caller) -> ServiceResult<Vec<Consultation>> {
        require_participant(caller)?;
        self.list(caller).await
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> ServiceResult<Consultation> {
        let consultation = self.load(id).await?;
        self.workflow.authorize_consultation(caller, Action::Read, &consultation).await?;
        Ok(consultation)
    }

    /// Records a consultation and completes its appointment.
    pub async fn create(&self, caller: &Caller, new: NewConsultation) -> ServiceResult<Consultation> {
        let draft = new.validate()?;
        self.workflow.create_consultation(caller, draft).await
    }

    /// The patch is applied to the stored record inside the store's write, so
    /// a link cleared concurrently by a prescription delete is not restored.
    pub async fn update(&self, caller: &Caller, id: Uuid, patch: ConsultationPatch) -> ServiceResult<Consultation> {
        let patch = patch.validate()?;
        let consultation = self.load(id).await?;
        let appointment = self.workflow.authorize_consultation(caller, Action::Update, &consultation).await?;
        if let (Some(prescription_id), Some(appointment)) = (patch.linked_prescription(), appointment) {
            self.workflow.require_prescription_of(prescription_id, appointment.patient_id).await?;
        }
        Ok(self.store.update_consultation(id, &patch).await?)
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        self.load(id).await?;
        authorize(caller, Action::Delete, Target::Kind(ResourceKind::Consultation))?;
        self.store.delete_consultation(id).await?;
        info!("consultation {} deleted by {}", id, caller.id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Consultation> {
        self.store
            .get_consultation(id)
            .await?
            .ok_or(ServiceError::NotFound("consultation"))
    }

}
