// scheduling/src/lib.rs
//! The appointment workflow and the per-entity services built on top of it.
//!
//! Every service operation follows the same order: check the payload, load
//! the record (missing means `NotFound`), ask the policy table, then apply
//! the change through the store.

pub mod errors;
pub mod services;
pub mod workflow;

use log::debug;

use models::ValidationError;
use security::{Action, Caller, Decision, Target};

pub use errors::{ServiceError, ServiceResult};
pub use services::{
    AppointmentService, AuthService, AuthSession, ConsultationService, FacilityService, MedicalProfileService,
    PrescriptionService, ServiceSettings, Services, UserService,
};
pub use workflow::{WorkflowEngine, check_transition};

pub(crate) fn authorize(caller: &Caller, action: Action, target: Target) -> ServiceResult<()> {
    match security::decide(caller, action, &target) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            debug!("{} {} denied {:?} on {:?}: {}", caller.role, caller.id, action, target.kind(), reason);
            Err(ServiceError::Denied(reason.to_string()))
        }
    }
}

/// The "my records" listings only make sense for patients and doctors.
pub(crate) fn require_participant(caller: &Caller) -> ServiceResult<()> {
    if caller.is_admin() {
        return Err(ValidationError::invalid("role", "Invalid user role for this operation").into());
    }
    Ok(())
}
