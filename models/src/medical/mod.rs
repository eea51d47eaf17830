// models/src/medical/mod.rs
pub mod appointment;
pub mod consultation;
pub mod facility;
pub mod medical_profile;
pub mod prescription;
pub mod role;
pub mod user;

pub use appointment::{
    Appointment, AppointmentDraft, AppointmentFilter, AppointmentPatch, AppointmentStats,
    AppointmentStatus, AppointmentView, NewAppointment, StatusCounts,
};
pub use consultation::{Consultation, ConsultationDraft, ConsultationFilter, ConsultationPatch, NewConsultation};
pub use facility::{Facility, FacilityDraft, FacilityPatch, FacilityType, Location, NewFacility};
pub use medical_profile::{
    BloodType, Gender, MedicalProfile, MedicalProfileDraft, MedicalProfilePatch, NewMedicalProfile,
};
pub use prescription::{
    NewPrescription, Prescription, PrescriptionDraft, PrescriptionFilter, PrescriptionPatch,
    PrescriptionView,
};
pub use role::Role;
pub use user::{Login, NewUser, PublicUser, User, UserDraft, UserPatch};
