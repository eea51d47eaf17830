// scheduling/src/services/mod.rs
//! One service per record kind. Each holds a handle on the shared store and,
//! where the kind takes part in the workflow, on the workflow engine.

pub mod appointments;
pub mod auth;
pub mod consultations;
pub mod facilities;
pub mod medical_profiles;
pub mod prescriptions;
pub mod users;

use std::sync::Arc;

use security::TokenService;
use storage::EntityStore;

use crate::workflow::WorkflowEngine;

pub use appointments::AppointmentService;
pub use auth::{AuthService, AuthSession};
pub use consultations::ConsultationService;
pub use facilities::FacilityService;
pub use medical_profiles::MedicalProfileService;
pub use prescriptions::PrescriptionService;
pub use users::UserService;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// bcrypt work factor for stored password hashes.
    pub bcrypt_cost: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings { bcrypt_cost: 10 }
    }
}

#[derive(Clone)]
pub struct Services {
    pub appointments: AppointmentService,
    pub consultations: ConsultationService,
    pub prescriptions: PrescriptionService,
    pub profiles: MedicalProfileService,
    pub facilities: FacilityService,
    pub users: UserService,
    pub auth: AuthService,
}

impl Services {
    pub fn new(store: Arc<dyn EntityStore>, tokens: TokenService, settings: ServiceSettings) -> Self {
        let workflow = WorkflowEngine::new(store.clone());
        let users = UserService::new(store.clone(), workflow.clone(), settings.clone());
        Services {
            appointments: AppointmentService::new(store.clone(), workflow.clone()),
            consultations: ConsultationService::new(store.clone(), workflow.clone()),
            prescriptions: PrescriptionService::new(store.clone(), workflow),
            profiles: MedicalProfileService::new(store.clone()),
            facilities: FacilityService::new(store.clone()),
            auth: AuthService::new(store, users.clone(), tokens),
            users,
        }
    }
}
