// storage/src/store.rs
use async_trait::async_trait;
use uuid::Uuid;

use models::{
    Appointment, AppointmentFilter, AppointmentStatus, Consultation, ConsultationFilter, ConsultationPatch, Facility,
    MedicalProfile, Prescription, PrescriptionFilter, User,
};

use crate::errors::StoreResult;

/// Record persistence for every entity kind.
///
/// Updates and deletes of a missing record fail with `StoreError::NotFound`;
/// lookups return `Ok(None)` instead.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    // --- Users ---
    /// Fails with `AlreadyExists` when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Fails with `AlreadyExists` when the new email belongs to another user.
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    /// Removes the user together with their medical profile, if any, in one
    /// write. Returns whether a profile was removed.
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;

    // --- Facilities ---
    async fn insert_facility(&self, facility: &Facility) -> StoreResult<()>;
    async fn get_facility(&self, id: Uuid) -> StoreResult<Option<Facility>>;
    async fn list_facilities(&self) -> StoreResult<Vec<Facility>>;
    async fn update_facility(&self, facility: &Facility) -> StoreResult<()>;
    async fn delete_facility(&self, id: Uuid) -> StoreResult<()>;

    // --- Medical profiles ---
    /// Fails with `AlreadyExists` when the user already has a profile.
    async fn insert_profile(&self, profile: &MedicalProfile) -> StoreResult<()>;
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<MedicalProfile>>;
    async fn get_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<MedicalProfile>>;
    async fn list_profiles(&self, user_id: Option<Uuid>) -> StoreResult<Vec<MedicalProfile>>;
    async fn update_profile(&self, profile: &MedicalProfile) -> StoreResult<()>;
    async fn delete_profile(&self, id: Uuid) -> StoreResult<()>;

    // --- Appointments ---
    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<()>;
    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;
    /// Ordered by appointment time.
    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>>;
    /// Writes `appointment` only if the stored status still equals `expected`,
    /// otherwise fails with `StaleState`.
    async fn update_appointment(&self, appointment: &Appointment, expected: AppointmentStatus) -> StoreResult<()>;
    async fn delete_appointment(&self, id: Uuid) -> StoreResult<()>;

    // --- Consultations ---
    //
    // Every write that sets a consultation's `prescription_id` checks, inside
    // the same atomic step, that the prescription exists, and fails with
    // `NotFound` otherwise.

    /// Inserts `consultation` and writes `appointment` (already moved to its
    /// new status) as one atomic step. Fails with `AlreadyExists` if the
    /// appointment has a consultation, or `StaleState` if the stored
    /// appointment status is no longer `expected`. Nothing is written on failure.
    async fn commit_consultation(
        &self,
        consultation: &Consultation,
        appointment: &Appointment,
        expected: AppointmentStatus,
    ) -> StoreResult<()>;
    async fn get_consultation(&self, id: Uuid) -> StoreResult<Option<Consultation>>;
    async fn get_consultation_by_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Consultation>>;
    async fn list_consultations(&self, filter: &ConsultationFilter) -> StoreResult<Vec<Consultation>>;
    /// Applies `patch` to the stored consultation and returns the result.
    /// Fields the patch leaves out keep their stored value.
    async fn update_consultation(&self, id: Uuid, patch: &ConsultationPatch) -> StoreResult<Consultation>;
    async fn delete_consultation(&self, id: Uuid) -> StoreResult<()>;
    /// Points a consultation at a prescription.
    async fn link_prescription(&self, consultation_id: Uuid, prescription_id: Uuid) -> StoreResult<()>;

    // --- Prescriptions ---
    async fn insert_prescription(&self, prescription: &Prescription) -> StoreResult<()>;
    async fn get_prescription(&self, id: Uuid) -> StoreResult<Option<Prescription>>;
    async fn list_prescriptions(&self, filter: &PrescriptionFilter) -> StoreResult<Vec<Prescription>>;
    async fn update_prescription(&self, prescription: &Prescription) -> StoreResult<()>;
    /// Removes the prescription and clears it from every consultation that
    /// points at it, atomically. Returns how many consultations were unlinked.
    async fn delete_prescription(&self, id: Uuid) -> StoreResult<usize>;
}
