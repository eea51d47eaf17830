// storage/src/sled_store.rs
//! Sled-backed engine. One tree per entity, values stored as JSON, plus index
//! trees for the uniqueness constraints. Every multi-record write runs inside a
//! sled transaction over the trees it touches.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::{Db, Transactional, Tree};
use uuid::Uuid;

use models::{
    Appointment, AppointmentFilter, AppointmentStatus, Consultation, ConsultationFilter, ConsultationPatch, Facility,
    MedicalProfile, Prescription, PrescriptionFilter, User,
};

use crate::errors::{StoreError, StoreResult};
use crate::store::EntityStore;

type TxResult<T> = ConflictableTransactionResult<T, StoreError>;

fn key(id: &Uuid) -> &[u8] {
    id.as_bytes()
}

fn email_key(email: &str) -> Vec<u8> {
    email.to_lowercase().into_bytes()
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn abort(err: impl Into<StoreError>) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(err.into())
}

fn tx_encode<T: Serialize>(value: &T) -> TxResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(abort)
}

fn tx_decode<T: DeserializeOwned>(bytes: &[u8]) -> TxResult<T> {
    serde_json::from_slice(bytes).map_err(abort)
}

fn id_from(bytes: &[u8]) -> StoreResult<Uuid> {
    Uuid::from_slice(bytes).map_err(|e| StoreError::Serialization(format!("corrupt index entry: {}", e)))
}

fn load<T: DeserializeOwned>(tree: &Tree, id: &Uuid) -> StoreResult<Option<T>> {
    tree.get(key(id))?.map(|bytes| decode(&bytes)).transpose()
}

fn load_all<T: DeserializeOwned>(tree: &Tree) -> StoreResult<Vec<T>> {
    tree.iter()
        .values()
        .map(|value| decode(&value?))
        .collect()
}

/// Overwrites an existing record; `NotFound` if there is nothing to overwrite.
fn replace_in(tree: &Tree, kind: &'static str, id: &Uuid, value: Vec<u8>) -> StoreResult<()> {
    tree.transaction(|tx| -> TxResult<()> {
        if tx.get(key(id))?.is_none() {
            return Err(abort(StoreError::not_found(kind, id)));
        }
        tx.insert(key(id), value.as_slice())?;
        Ok(())
    })?;
    Ok(())
}

fn remove_from(tree: &Tree, kind: &'static str, id: &Uuid) -> StoreResult<()> {
    tree.remove(key(id))?
        .map(|_| ())
        .ok_or_else(|| StoreError::not_found(kind, id))
}

// --- prescription -> consultations back-index ---

/// A consultation may only point at a prescription that exists at commit time.
fn tx_require_prescription(prescriptions: &TransactionalTree, id: Option<Uuid>) -> TxResult<()> {
    match id {
        Some(id) if prescriptions.get(key(&id))?.is_none() => Err(abort(StoreError::not_found("prescription", id))),
        _ => Ok(()),
    }
}

fn tx_link(links: &TransactionalTree, prescription_id: &Uuid, consultation_id: &Uuid) -> TxResult<()> {
    let mut ids: Vec<Uuid> = match links.get(key(prescription_id))? {
        Some(bytes) => tx_decode(&bytes)?,
        None => Vec::new(),
    };
    if !ids.contains(consultation_id) {
        ids.push(*consultation_id);
    }
    links.insert(key(prescription_id), tx_encode(&ids)?)?;
    Ok(())
}

fn tx_unlink(links: &TransactionalTree, prescription_id: &Uuid, consultation_id: &Uuid) -> TxResult<()> {
    if let Some(bytes) = links.get(key(prescription_id))? {
        let mut ids: Vec<Uuid> = tx_decode(&bytes)?;
        ids.retain(|id| id != consultation_id);
        if ids.is_empty() {
            links.remove(key(prescription_id))?;
        } else {
            links.insert(key(prescription_id), tx_encode(&ids)?)?;
        }
    }
    Ok(())
}

/// Moves a consultation's back-index entry when its prescription changes.
fn tx_relink(links: &TransactionalTree, consultation_id: &Uuid, old: Option<Uuid>, new: Option<Uuid>) -> TxResult<()> {
    if old == new {
        return Ok(());
    }
    if let Some(old) = old {
        tx_unlink(links, &old, consultation_id)?;
    }
    if let Some(new) = new {
        tx_link(links, &new, consultation_id)?;
    }
    Ok(())
}

pub struct SledStore {
    db: Db,
    users: Tree,
    user_emails: Tree,
    facilities: Tree,
    profiles: Tree,
    profile_owners: Tree,
    appointments: Tree,
    consultations: Tree,
    consultation_appointments: Tree,
    prescriptions: Tree,
    prescription_links: Tree,
}

impl SledStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::with_db(sled::open(path)?)
    }

    /// A throwaway database removed when dropped.
    pub fn temporary() -> StoreResult<Self> {
        Self::with_db(sled::Config::new().temporary(true).open()?)
    }

    fn with_db(db: Db) -> StoreResult<Self> {
        Ok(SledStore {
            users: db.open_tree("users")?,
            user_emails: db.open_tree("user_emails")?,
            facilities: db.open_tree("facilities")?,
            profiles: db.open_tree("medical_profiles")?,
            profile_owners: db.open_tree("medical_profile_owners")?,
            appointments: db.open_tree("appointments")?,
            consultations: db.open_tree("consultations")?,
            consultation_appointments: db.open_tree("consultation_appointments")?,
            prescriptions: db.open_tree("prescriptions")?,
            prescription_links: db.open_tree("prescription_links")?,
            db,
        })
    }

    pub async fn flush(&self) -> StoreResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for SledStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let value = encode(user)?;
        let email = email_key(&user.email);
        (&self.users, &self.user_emails).transaction(|(users, emails)| -> TxResult<()> {
            if emails.get(email.as_slice())?.is_some() {
                return Err(abort(StoreError::AlreadyExists(format!("email {}", user.email))));
            }
            emails.insert(email.as_slice(), key(&user.id))?;
            users.insert(key(&user.id), value.as_slice())?;
            Ok(())
        })?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        load(&self.users, &id)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        match self.user_emails.get(email_key(email))? {
            Some(id) => load(&self.users, &id_from(&id)?),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = load_all(&self.users)?;
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let value = encode(user)?;
        let new_email = email_key(&user.email);
        (&self.users, &self.user_emails).transaction(|(users, emails)| -> TxResult<()> {
            let Some(stored) = users.get(key(&user.id))? else {
                return Err(abort(StoreError::not_found("user", user.id)));
            };
            let stored: User = tx_decode(&stored)?;
            let old_email = email_key(&stored.email);
            if old_email != new_email {
                if emails.get(new_email.as_slice())?.is_some() {
                    return Err(abort(StoreError::AlreadyExists(format!("email {}", user.email))));
                }
                emails.remove(old_email.as_slice())?;
                emails.insert(new_email.as_slice(), key(&user.id))?;
            }
            users.insert(key(&user.id), value.as_slice())?;
            Ok(())
        })?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let removed = (&self.users, &self.user_emails, &self.profiles, &self.profile_owners).transaction(
            |(users, emails, profiles, owners)| -> TxResult<bool> {
                let Some(stored) = users.remove(key(&id))? else {
                    return Err(abort(StoreError::not_found("user", id)));
                };
                let stored: User = tx_decode(&stored)?;
                emails.remove(email_key(&stored.email))?;
                let Some(profile_id) = owners.remove(key(&id))? else {
                    return Ok(false);
                };
                profiles.remove(profile_id)?;
                Ok(true)
            },
        )?;
        Ok(removed)
    }

    async fn insert_facility(&self, facility: &Facility) -> StoreResult<()> {
        self.facilities.insert(key(&facility.id), encode(facility)?)?;
        Ok(())
    }

    async fn get_facility(&self, id: Uuid) -> StoreResult<Option<Facility>> {
        load(&self.facilities, &id)
    }

    async fn list_facilities(&self) -> StoreResult<Vec<Facility>> {
        let mut facilities: Vec<Facility> = load_all(&self.facilities)?;
        facilities.sort_by_key(|f| f.created_at);
        Ok(facilities)
    }

    async fn update_facility(&self, facility: &Facility) -> StoreResult<()> {
        replace_in(&self.facilities, "facility", &facility.id, encode(facility)?)
    }

    async fn delete_facility(&self, id: Uuid) -> StoreResult<()> {
        remove_from(&self.facilities, "facility", &id)
    }

    async fn insert_profile(&self, profile: &MedicalProfile) -> StoreResult<()> {
        let value = encode(profile)?;
        (&self.profiles, &self.profile_owners).transaction(|(profiles, owners)| -> TxResult<()> {
            if owners.get(key(&profile.user_id))?.is_some() {
                return Err(abort(StoreError::AlreadyExists(format!(
                    "medical profile for user {}",
                    profile.user_id
                ))));
            }
            owners.insert(key(&profile.user_id), key(&profile.id))?;
            profiles.insert(key(&profile.id), value.as_slice())?;
            Ok(())
        })?;
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<MedicalProfile>> {
        load(&self.profiles, &id)
    }

    async fn get_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<MedicalProfile>> {
        match self.profile_owners.get(key(&user_id))? {
            Some(id) => load(&self.profiles, &id_from(&id)?),
            None => Ok(None),
        }
    }

    async fn list_profiles(&self, user_id: Option<Uuid>) -> StoreResult<Vec<MedicalProfile>> {
        if let Some(user_id) = user_id {
            return Ok(self.get_profile_by_user(user_id).await?.into_iter().collect());
        }
        let mut profiles: Vec<MedicalProfile> = load_all(&self.profiles)?;
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    async fn update_profile(&self, profile: &MedicalProfile) -> StoreResult<()> {
        replace_in(&self.profiles, "medical profile", &profile.id, encode(profile)?)
    }

    async fn delete_profile(&self, id: Uuid) -> StoreResult<()> {
        (&self.profiles, &self.profile_owners).transaction(|(profiles, owners)| -> TxResult<()> {
            let Some(stored) = profiles.remove(key(&id))? else {
                return Err(abort(StoreError::not_found("medical profile", id)));
            };
            let stored: MedicalProfile = tx_decode(&stored)?;
            owners.remove(key(&stored.user_id))?;
            Ok(())
        })?;
        Ok(())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<()> {
        self.appointments.insert(key(&appointment.id), encode(appointment)?)?;
        Ok(())
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        load(&self.appointments, &id)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = load_all::<Appointment>(&self.appointments)?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        appointments.sort_by_key(|a| a.appointment_time);
        Ok(appointments)
    }

    async fn update_appointment(&self, appointment: &Appointment, expected: AppointmentStatus) -> StoreResult<()> {
        let value = encode(appointment)?;
        self.appointments.transaction(|tx| -> TxResult<()> {
            let Some(stored) = tx.get(key(&appointment.id))? else {
                return Err(abort(StoreError::not_found("appointment", appointment.id)));
            };
            let stored: Appointment = tx_decode(&stored)?;
            if stored.status != expected {
                return Err(abort(StoreError::stale("appointment", appointment.id)));
            }
            tx.insert(key(&appointment.id), value.as_slice())?;
            Ok(())
        })?;
        Ok(())
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<()> {
        remove_from(&self.appointments, "appointment", &id)
    }

    async fn commit_consultation(
        &self,
        consultation: &Consultation,
        appointment: &Appointment,
        expected: AppointmentStatus,
    ) -> StoreResult<()> {
        let consultation_value = encode(consultation)?;
        let appointment_value = encode(appointment)?;
        (
            &self.appointments,
            &self.consultations,
            &self.consultation_appointments,
            &self.prescriptions,
            &self.prescription_links,
        )
            .transaction(|(appointments, consultations, by_appointment, prescriptions, links)| -> TxResult<()> {
                if by_appointment.get(key(&consultation.appointment_id))?.is_some() {
                    return Err(abort(StoreError::AlreadyExists(format!(
                        "consultation for appointment {}",
                        consultation.appointment_id
                    ))));
                }
                tx_require_prescription(prescriptions, consultation.prescription_id)?;
                let Some(stored) = appointments.get(key(&appointment.id))? else {
                    return Err(abort(StoreError::not_found("appointment", appointment.id)));
                };
                let stored: Appointment = tx_decode(&stored)?;
                if stored.status != expected {
                    return Err(abort(StoreError::stale("appointment", appointment.id)));
                }
                appointments.insert(key(&appointment.id), appointment_value.as_slice())?;
                consultations.insert(key(&consultation.id), consultation_value.as_slice())?;
                by_appointment.insert(key(&consultation.appointment_id), key(&consultation.id))?;
                if let Some(prescription_id) = consultation.prescription_id {
                    tx_link(links, &prescription_id, &consultation.id)?;
                }
                Ok(())
            })?;
        Ok(())
    }

    async fn get_consultation(&self, id: Uuid) -> StoreResult<Option<Consultation>> {
        load(&self.consultations, &id)
    }

    async fn get_consultation_by_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Consultation>> {
        match self.consultation_appointments.get(key(&appointment_id))? {
            Some(id) => load(&self.consultations, &id_from(&id)?),
            None => Ok(None),
        }
    }

    async fn list_consultations(&self, filter: &ConsultationFilter) -> StoreResult<Vec<Consultation>> {
        let mut consultations: Vec<Consultation> = load_all::<Consultation>(&self.consultations)?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();
        consultations.sort_by_key(|c| c.created_at);
        Ok(consultations)
    }

    async fn update_consultation(&self, id: Uuid, patch: &ConsultationPatch) -> StoreResult<Consultation> {
        let updated = (&self.consultations, &self.prescriptions, &self.prescription_links).transaction(
            |(consultations, prescriptions, links)| -> TxResult<Consultation> {
                let Some(stored) = consultations.get(key(&id))? else {
                    return Err(abort(StoreError::not_found("consultation", id)));
                };
                let mut consultation: Consultation = tx_decode(&stored)?;
                tx_require_prescription(prescriptions, patch.linked_prescription())?;
                let previous = consultation.prescription_id;
                consultation.apply_patch(patch);
                tx_relink(links, &id, previous, consultation.prescription_id)?;
                consultations.insert(key(&id), tx_encode(&consultation)?)?;
                Ok(consultation)
            },
        )?;
        Ok(updated)
    }

    async fn delete_consultation(&self, id: Uuid) -> StoreResult<()> {
        (&self.consultations, &self.consultation_appointments, &self.prescription_links).transaction(
            |(consultations, by_appointment, links)| -> TxResult<()> {
                let Some(stored) = consultations.remove(key(&id))? else {
                    return Err(abort(StoreError::not_found("consultation", id)));
                };
                let stored: Consultation = tx_decode(&stored)?;
                by_appointment.remove(key(&stored.appointment_id))?;
                tx_relink(links, &id, stored.prescription_id, None)?;
                Ok(())
            },
        )?;
        Ok(())
    }

    async fn link_prescription(&self, consultation_id: Uuid, prescription_id: Uuid) -> StoreResult<()> {
        (&self.consultations, &self.prescriptions, &self.prescription_links).transaction(
            |(consultations, prescriptions, links)| -> TxResult<()> {
                let Some(stored) = consultations.get(key(&consultation_id))? else {
                    return Err(abort(StoreError::not_found("consultation", consultation_id)));
                };
                let mut stored: Consultation = tx_decode(&stored)?;
                tx_require_prescription(prescriptions, Some(prescription_id))?;
                tx_relink(links, &consultation_id, stored.prescription_id, Some(prescription_id))?;
                stored.prescription_id = Some(prescription_id);
                stored.updated_at = Utc::now();
                consultations.insert(key(&consultation_id), tx_encode(&stored)?)?;
                Ok(())
            },
        )?;
        Ok(())
    }

    async fn insert_prescription(&self, prescription: &Prescription) -> StoreResult<()> {
        self.prescriptions.insert(key(&prescription.id), encode(prescription)?)?;
        Ok(())
    }

    async fn get_prescription(&self, id: Uuid) -> StoreResult<Option<Prescription>> {
        load(&self.prescriptions, &id)
    }

    async fn list_prescriptions(&self, filter: &PrescriptionFilter) -> StoreResult<Vec<Prescription>> {
        let mut prescriptions: Vec<Prescription> = load_all::<Prescription>(&self.prescriptions)?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        prescriptions.sort_by_key(|p| p.created_at);
        Ok(prescriptions)
    }

    async fn update_prescription(&self, prescription: &Prescription) -> StoreResult<()> {
        replace_in(&self.prescriptions, "prescription", &prescription.id, encode(prescription)?)
    }

    async fn delete_prescription(&self, id: Uuid) -> StoreResult<usize> {
        let unlinked = (&self.prescriptions, &self.consultations, &self.prescription_links).transaction(
            |(prescriptions, consultations, links)| -> TxResult<usize> {
                if prescriptions.remove(key(&id))?.is_none() {
                    return Err(abort(StoreError::not_found("prescription", id)));
                }
                let linked: Vec<Uuid> = match links.remove(key(&id))? {
                    Some(bytes) => tx_decode(&bytes)?,
                    None => Vec::new(),
                };
                let now = Utc::now();
                let mut unlinked = 0;
                for consultation_id in linked {
                    let Some(stored) = consultations.get(key(&consultation_id))? else {
                        continue;
                    };
                    let mut consultation: Consultation = tx_decode(&stored)?;
                    if consultation.prescription_id == Some(id) {
                        consultation.prescription_id = None;
                        consultation.updated_at = now;
                        consultations.insert(key(&consultation_id), tx_encode(&consultation)?)?;
                        unlinked += 1;
                    }
                }
                Ok(unlinked)
            },
        )?;
        Ok(unlinked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use tempfile::tempdir;

    fn store() -> SledStore {
        SledStore::temporary().unwrap()
    }

    #[tokio::test]
    async fn should_reject_duplicate_email() {
        exercise_unique_email(&store()).await;
    }

    #[tokio::test]
    async fn should_commit_consultation_once() {
        exercise_consultation_commit(&store()).await;
    }

    #[tokio::test]
    async fn should_unlink_deleted_prescription() {
        exercise_prescription_unlink(&store()).await;
    }

    #[tokio::test]
    async fn should_refuse_stale_appointment_write() {
        exercise_conditional_update(&store()).await;
    }

    #[tokio::test]
    async fn should_keep_one_profile_per_user() {
        exercise_profile_uniqueness(&store()).await;
    }

    #[tokio::test]
    async fn should_only_link_existing_prescriptions() {
        exercise_prescription_references(&store()).await;
    }

    #[tokio::test]
    async fn should_delete_profile_with_user() {
        exercise_user_delete_cascade(&store()).await;
    }

    #[tokio::test]
    async fn should_move_email_index_on_update() {
        let store = store();
        let mut ada = user("ada@example.com");
        store.insert_user(&ada).await.unwrap();
        ada.email = "countess@example.com".into();
        store.update_user(&ada).await.unwrap();

        assert!(store.find_user_by_email("ada@example.com").await.unwrap().is_none());
        assert_eq!(store.find_user_by_email("Countess@example.com").await.unwrap().unwrap().id, ada.id);
        // the old address is free again
        store.insert_user(&user("ada@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn should_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let (patient, doctor) = (Uuid::new_v4(), Uuid::new_v4());
        let appt = appointment(patient, doctor);
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.insert_appointment(&appt).await.unwrap();
            store.flush().await.unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.get_appointment(appt.id).await.unwrap(), Some(appt));
    }

    #[tokio::test]
    async fn should_unlink_only_current_links() {
        let store = store();
        let (consultation, _) = committed_consultation(&store).await;
        let (first, second) = (prescription(), prescription());
        store.insert_prescription(&first).await.unwrap();
        store.insert_prescription(&second).await.unwrap();

        store.link_prescription(consultation.id, first.id).await.unwrap();
        store.link_prescription(consultation.id, second.id).await.unwrap();

        assert_eq!(store.delete_prescription(first.id).await.unwrap(), 0);
        let reread = store.get_consultation(consultation.id).await.unwrap().unwrap();
        assert_eq!(reread.prescription_id, Some(second.id));
    }
}
