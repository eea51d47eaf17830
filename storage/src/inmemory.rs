// storage/src/inmemory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use models::{
    Appointment, AppointmentFilter, AppointmentStatus, Consultation, ConsultationFilter, ConsultationPatch, Facility,
    MedicalProfile, Prescription, PrescriptionFilter, User,
};

use crate::errors::{StoreError, StoreResult};
use crate::store::EntityStore;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    facilities: HashMap<Uuid, Facility>,
    profiles: HashMap<Uuid, MedicalProfile>,
    appointments: HashMap<Uuid, Appointment>,
    consultations: HashMap<Uuid, Consultation>,
    prescriptions: HashMap<Uuid, Prescription>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn require_prescription(&self, id: Option<Uuid>) -> StoreResult<()> {
        match id {
            Some(id) if !self.prescriptions.contains_key(&id) => Err(StoreError::not_found("prescription", id)),
            _ => Ok(()),
        }
    }
}

/// Everything behind one lock, so each trait call is atomic with respect to
/// every other.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    items.sort_by_key(|item| key(item));
    items
}

fn replace<T>(table: &mut HashMap<Uuid, T>, kind: &'static str, id: Uuid, value: &T) -> StoreResult<()>
where
    T: Clone,
{
    match table.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StoreError::not_found(kind, id)),
    }
}

fn remove<T>(table: &mut HashMap<Uuid, T>, kind: &'static str, id: Uuid) -> StoreResult<()> {
    table
        .remove(&id)
        .map(|_| ())
        .ok_or_else(|| StoreError::not_found(kind, id))
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(StoreError::AlreadyExists(format!("email {}", user.email)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = self.tables.read().await.users.values().cloned().collect();
        Ok(sorted_by(users, |u| u.created_at))
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::AlreadyExists(format!("email {}", user.email)));
        }
        replace(&mut tables.users, "user", user.id, user)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        remove(&mut tables.users, "user", id)?;
        let before = tables.profiles.len();
        tables.profiles.retain(|_, p| p.user_id != id);
        Ok(tables.profiles.len() < before)
    }

    async fn insert_facility(&self, facility: &Facility) -> StoreResult<()> {
        self.tables.write().await.facilities.insert(facility.id, facility.clone());
        Ok(())
    }

    async fn get_facility(&self, id: Uuid) -> StoreResult<Option<Facility>> {
        Ok(self.tables.read().await.facilities.get(&id).cloned())
    }

    async fn list_facilities(&self) -> StoreResult<Vec<Facility>> {
        let facilities = self.tables.read().await.facilities.values().cloned().collect();
        Ok(sorted_by(facilities, |f| f.created_at))
    }

    async fn update_facility(&self, facility: &Facility) -> StoreResult<()> {
        replace(&mut self.tables.write().await.facilities, "facility", facility.id, facility)
    }

    async fn delete_facility(&self, id: Uuid) -> StoreResult<()> {
        remove(&mut self.tables.write().await.facilities, "facility", id)
    }

    async fn insert_profile(&self, profile: &MedicalProfile) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.profiles.values().any(|p| p.user_id == profile.user_id) {
            return Err(StoreError::AlreadyExists(format!("medical profile for user {}", profile.user_id)));
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<MedicalProfile>> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn get_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<MedicalProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn list_profiles(&self, user_id: Option<Uuid>) -> StoreResult<Vec<MedicalProfile>> {
        let tables = self.tables.read().await;
        let profiles = tables
            .profiles
            .values()
            .filter(|p| user_id.map_or(true, |id| p.user_id == id))
            .cloned()
            .collect();
        Ok(sorted_by(profiles, |p| p.created_at))
    }

    async fn update_profile(&self, profile: &MedicalProfile) -> StoreResult<()> {
        replace(&mut self.tables.write().await.profiles, "medical profile", profile.id, profile)
    }

    async fn delete_profile(&self, id: Uuid) -> StoreResult<()> {
        remove(&mut self.tables.write().await.profiles, "medical profile", id)
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<()> {
        self.tables.write().await.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.read().await;
        let appointments = tables.appointments.values().filter(|a| filter.matches(a)).cloned().collect();
        Ok(sorted_by(appointments, |a| a.appointment_time))
    }

    async fn update_appointment(&self, appointment: &Appointment, expected: AppointmentStatus) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .appointments
            .get_mut(&appointment.id)
            .ok_or_else(|| StoreError::not_found("appointment", appointment.id))?;
        if stored.status != expected {
            return Err(StoreError::stale("appointment", appointment.id));
        }
        *stored = appointment.clone();
        Ok(())
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<()> {
        remove(&mut self.tables.write().await.appointments, "appointment", id)
    }

    async fn commit_consultation(
        &self,
        consultation: &Consultation,
        appointment: &Appointment,
        expected: AppointmentStatus,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.consultations.values().any(|c| c.appointment_id == consultation.appointment_id) {
            return Err(StoreError::AlreadyExists(format!(
                "consultation for appointment {}",
                consultation.appointment_id
            )));
        }
        tables.require_prescription(consultation.prescription_id)?;
        let stored = tables
            .appointments
            .get_mut(&appointment.id)
            .ok_or_else(|| StoreError::not_found("appointment", appointment.id))?;
        if stored.status != expected {
            return Err(StoreError::stale("appointment", appointment.id));
        }
        *stored = appointment.clone();
        tables.consultations.insert(consultation.id, consultation.clone());
        Ok(())
    }

    async fn get_consultation(&self, id: Uuid) -> StoreResult<Option<Consultation>> {
        Ok(self.tables.read().await.consultations.get(&id).cloned())
    }

    async fn get_consultation_by_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Consultation>> {
        let tables = self.tables.read().await;
        Ok(tables.consultations.values().find(|c| c.appointment_id == appointment_id).cloned())
    }

    async fn list_consultations(&self, filter: &ConsultationFilter) -> StoreResult<Vec<Consultation>> {
        let tables = self.tables.read().await;
        let consultations = tables.consultations.values().filter(|c| filter.matches(c)).cloned().collect();
        Ok(sorted_by(consultations, |c| c.created_at))
    }

    async fn update_consultation(&self, id: Uuid, patch: &ConsultationPatch) -> StoreResult<Consultation> {
        let mut tables = self.tables.write().await;
        if !tables.consultations.contains_key(&id) {
            return Err(StoreError::not_found("consultation", id));
        }
        tables.require_prescription(patch.linked_prescription())?;
        let consultation = tables
            .consultations
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("consultation", id))?;
        consultation.apply_patch(patch);
        Ok(consultation.clone())
    }

    async fn delete_consultation(&self, id: Uuid) -> StoreResult<()> {
        remove(&mut self.tables.write().await.consultations, "consultation", id)
    }

    async fn link_prescription(&self, consultation_id: Uuid, prescription_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.require_prescription(Some(prescription_id))?;
        let consultation = tables
            .consultations
            .get_mut(&consultation_id)
            .ok_or_else(|| StoreError::not_found("consultation", consultation_id))?;
        consultation.prescription_id = Some(prescription_id);
        consultation.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_prescription(&self, prescription: &Prescription) -> StoreResult<()> {
        self.tables.write().await.prescriptions.insert(prescription.id, prescription.clone());
        Ok(())
    }

    async fn get_prescription(&self, id: Uuid) -> StoreResult<Option<Prescription>> {
        Ok(self.tables.read().await.prescriptions.get(&id).cloned())
    }

    async fn list_prescriptions(&self, filter: &PrescriptionFilter) -> StoreResult<Vec<Prescription>> {
        let tables = self.tables.read().await;
        let prescriptions = tables.prescriptions.values().filter(|p| filter.matches(p)).cloned().collect();
        Ok(sorted_by(prescriptions, |p| p.created_at))
    }

    async fn update_prescription(&self, prescription: &Prescription) -> StoreResult<()> {
        replace(&mut self.tables.write().await.prescriptions, "prescription", prescription.id, prescription)
    }

    async fn delete_prescription(&self, id: Uuid) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        if tables.prescriptions.remove(&id).is_none() {
            return Err(StoreError::not_found("prescription", id));
        }
        let now = Utc::now();
        let mut unlinked = 0;
        for consultation in tables.consultations.values_mut() {
            if consultation.prescription_id == Some(id) {
                consultation.prescription_id = None;
                consultation.updated_at = now;
                unlinked += 1;
            }
        }
        Ok(unlinked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[tokio::test]
    async fn should_reject_duplicate_email() {
        let store = InMemoryStore::new();
        exercise_unique_email(&store).await;
    }

    #[tokio::test]
    async fn should_commit_consultation_once() {
        let store = InMemoryStore::new();
        exercise_consultation_commit(&store).await;
    }

    #[tokio::test]
    async fn should_unlink_deleted_prescription() {
        let store = InMemoryStore::new();
        exercise_prescription_unlink(&store).await;
    }

    #[tokio::test]
    async fn should_refuse_stale_appointment_write() {
        let store = InMemoryStore::new();
        exercise_conditional_update(&store).await;
    }

    #[tokio::test]
    async fn should_keep_one_profile_per_user() {
        let store = InMemoryStore::new();
        exercise_profile_uniqueness(&store).await;
    }

    #[tokio::test]
    async fn should_only_link_existing_prescriptions() {
        let store = InMemoryStore::new();
        exercise_prescription_references(&store).await;
    }

    #[tokio::test]
    async fn should_delete_profile_with_user() {
        let store = InMemoryStore::new();
        exercise_user_delete_cascade(&store).await;
    }

    #[tokio::test]
    async fn should_filter_appointments_by_participant() {
        let store = InMemoryStore::new();
        let (patient, doctor) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_appointment(&appointment(patient, doctor)).await.unwrap();
        store.insert_appointment(&appointment(Uuid::new_v4(), doctor)).await.unwrap();

        let mine = store.list_appointments(&AppointmentFilter::for_patient(patient)).await.unwrap();
        assert_eq!(mine.len(), 1);
        let theirs = store.list_appointments(&AppointmentFilter::for_doctor(doctor)).await.unwrap();
        assert_eq!(theirs.len(), 2);
    }
}
