// storage/src/test_support.rs
// Behaviour every engine must share; each engine's tests run these against itself.

use chrono::{Duration, Utc};
use uuid::Uuid;

use models::{
    Appointment, AppointmentDraft, AppointmentStatus, Consultation, ConsultationDraft, ConsultationPatch, MedicalProfile,
    Prescription, PrescriptionDraft, Role, User,
};

use crate::errors::StoreError;
use crate::store::EntityStore;

pub fn user(email: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        full_name: "Test User".into(),
        email: email.into(),
        phone_number: "555-0100".into(),
        password_hash: "not-a-real-hash".into(),
        role: Role::Patient,
        created_at: now,
        updated_at: now,
    }
}

pub fn appointment(patient_id: Uuid, doctor_id: Uuid) -> Appointment {
    let draft = AppointmentDraft {
        patient_id: None,
        doctor_id,
        facility_id: Uuid::new_v4(),
        appointment_time: Utc::now() + Duration::days(2),
        reason: "follow-up".into(),
        notes: None,
    };
    Appointment::from_draft(draft, patient_id)
}

pub fn prescription() -> Prescription {
    let draft = PrescriptionDraft {
        patient_id: Uuid::new_v4(),
        medication: "Metformin".into(),
        dosage: "500mg".into(),
        instructions: "twice daily".into(),
        start_date: None,
        end_date: None,
        refills: 2,
        consultation_id: None,
    };
    Prescription::from_draft(draft, Uuid::new_v4())
}

pub fn consultation_for(appointment: &Appointment) -> Consultation {
    Consultation::from_draft(ConsultationDraft {
        appointment_id: appointment.id,
        notes: "stable".into(),
        diagnosis: "hypertension".into(),
        prescription_id: None,
    })
}

/// A Confirmed appointment completed through `commit_consultation`.
pub async fn committed_consultation<S: EntityStore>(store: &S) -> (Consultation, Appointment) {
    let mut appt = appointment(Uuid::new_v4(), Uuid::new_v4());
    appt.status = AppointmentStatus::Confirmed;
    store.insert_appointment(&appt).await.unwrap();

    let consultation = consultation_for(&appt);
    appt.status = AppointmentStatus::Completed;
    store
        .commit_consultation(&consultation, &appt, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    (consultation, appt)
}

pub async fn exercise_unique_email<S: EntityStore>(store: &S) {
    store.insert_user(&user("grace@example.com")).await.unwrap();
    let err = store.insert_user(&user("Grace@Example.com")).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)), "got {:?}", err);

    let other = user("alan@example.com");
    store.insert_user(&other).await.unwrap();
    let mut renamed = other.clone();
    renamed.email = "grace@example.com".into();
    assert!(matches!(store.update_user(&renamed).await, Err(StoreError::AlreadyExists(_))));
    assert_eq!(store.list_users().await.unwrap().len(), 2);

    assert!(!store.delete_user(other.id).await.unwrap());
    assert!(store.find_user_by_email("alan@example.com").await.unwrap().is_none());
    assert!(matches!(store.delete_user(other.id).await, Err(StoreError::NotFound { .. })));
}

pub async fn exercise_consultation_commit<S: EntityStore>(store: &S) {
    let (consultation, appt) = committed_consultation(store).await;
    assert_eq!(
        store.get_appointment(appt.id).await.unwrap().unwrap().status,
        AppointmentStatus::Completed
    );
    assert_eq!(
        store.get_consultation_by_appointment(appt.id).await.unwrap(),
        Some(consultation)
    );

    // a second commit for the same appointment writes nothing
    let second = consultation_for(&appt);
    let err = store
        .commit_consultation(&second, &appt, AppointmentStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)), "got {:?}", err);
    assert!(store.get_consultation(second.id).await.unwrap().is_none());

    // a commit against a Pending appointment is stale and leaves it Pending
    let pending = appointment(Uuid::new_v4(), Uuid::new_v4());
    store.insert_appointment(&pending).await.unwrap();
    let orphan = consultation_for(&pending);
    let mut completed = pending.clone();
    completed.status = AppointmentStatus::Completed;
    let err = store
        .commit_consultation(&orphan, &completed, AppointmentStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::StaleState { .. }), "got {:?}", err);
    assert!(store.get_consultation_by_appointment(pending.id).await.unwrap().is_none());
    assert_eq!(
        store.get_appointment(pending.id).await.unwrap().unwrap().status,
        AppointmentStatus::Pending
    );
}

pub async fn exercise_prescription_unlink<S: EntityStore>(store: &S) {
    let (consultation, _) = committed_consultation(store).await;
    let rx = prescription();
    store.insert_prescription(&rx).await.unwrap();
    store.link_prescription(consultation.id, rx.id).await.unwrap();
    assert_eq!(
        store.get_consultation(consultation.id).await.unwrap().unwrap().prescription_id,
        Some(rx.id)
    );

    assert_eq!(store.delete_prescription(rx.id).await.unwrap(), 1);
    assert!(store.get_prescription(rx.id).await.unwrap().is_none());
    assert_eq!(store.get_consultation(consultation.id).await.unwrap().unwrap().prescription_id, None);
    assert!(matches!(store.delete_prescription(rx.id).await, Err(StoreError::NotFound { .. })));
}

pub async fn exercise_conditional_update<S: EntityStore>(store: &S) {
    let appt = appointment(Uuid::new_v4(), Uuid::new_v4());
    store.insert_appointment(&appt).await.unwrap();

    let mut confirmed = appt.clone();
    confirmed.status = AppointmentStatus::Confirmed;
    store.update_appointment(&confirmed, AppointmentStatus::Pending).await.unwrap();

    // a writer that still believes the appointment is Pending loses
    let mut cancelled = appt.clone();
    cancelled.status = AppointmentStatus::Cancelled;
    let err = store
        .update_appointment(&cancelled, AppointmentStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::StaleState { .. }), "got {:?}", err);
    assert_eq!(
        store.get_appointment(appt.id).await.unwrap().unwrap().status,
        AppointmentStatus::Confirmed
    );
}

pub async fn exercise_profile_uniqueness<S: EntityStore>(store: &S) {
    let owner = Uuid::new_v4();
    let profile = MedicalProfile::blank_for(owner, None, None);
    store.insert_profile(&profile).await.unwrap();
    let err = store
        .insert_profile(&MedicalProfile::blank_for(owner, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)), "got {:?}", err);

    assert_eq!(store.get_profile_by_user(owner).await.unwrap(), Some(profile.clone()));
    assert_eq!(store.list_profiles(Some(owner)).await.unwrap().len(), 1);
    store.delete_profile(profile.id).await.unwrap();
    assert!(store.get_profile(profile.id).await.unwrap().is_none());
    assert!(store.get_profile_by_user(owner).await.unwrap().is_none());
    assert!(matches!(store.delete_profile(profile.id).await, Err(StoreError::NotFound { .. })));
}

pub async fn exercise_user_delete_cascade<S: EntityStore>(store: &S) {
    let patient = user("rosalind@example.com");
    store.insert_user(&patient).await.unwrap();
    let profile = MedicalProfile::blank_for(patient.id, None, None);
    store.insert_profile(&profile).await.unwrap();

    assert!(store.delete_user(patient.id).await.unwrap());
    assert!(store.get_user(patient.id).await.unwrap().is_none());
    assert!(store.get_profile(profile.id).await.unwrap().is_none());
    assert!(store.get_profile_by_user(patient.id).await.unwrap().is_none());

    // the address and the profile slot are both free again
    let returning = user("rosalind@example.com");
    store.insert_user(&returning).await.unwrap();
    store
        .insert_profile(&MedicalProfile::blank_for(returning.id, None, None))
        .await
        .unwrap();
    assert!(matches!(store.delete_user(patient.id).await, Err(StoreError::NotFound { .. })));
}

pub async fn exercise_prescription_references<S: EntityStore>(store: &S) {
    let (consultation, _) = committed_consultation(store).await;
    let missing = Uuid::new_v4();

    let err = store.link_prescription(consultation.id, missing).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "prescription", .. }), "got {:?}", err);

    let patch = ConsultationPatch { prescription_id: Some(Some(missing)), ..Default::default() };
    let err = store.update_consultation(consultation.id, &patch).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "prescription", .. }), "got {:?}", err);
    assert_eq!(store.get_consultation(consultation.id).await.unwrap().unwrap().prescription_id, None);

    // a commit citing a missing prescription leaves the appointment Confirmed
    let mut appt = appointment(Uuid::new_v4(), Uuid::new_v4());
    appt.status = AppointmentStatus::Confirmed;
    store.insert_appointment(&appt).await.unwrap();
    let mut dangling = consultation_for(&appt);
    dangling.prescription_id = Some(missing);
    let mut completed = appt.clone();
    completed.status = AppointmentStatus::Completed;
    let err = store
        .commit_consultation(&dangling, &completed, AppointmentStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "prescription", .. }), "got {:?}", err);
    assert!(store.get_consultation_by_appointment(appt.id).await.unwrap().is_none());
    assert_eq!(
        store.get_appointment(appt.id).await.unwrap().unwrap().status,
        AppointmentStatus::Confirmed
    );

    // a patch without prescription_id keeps the stored link, even when the
    // caller last saw a different one
    let rx = prescription();
    store.insert_prescription(&rx).await.unwrap();
    store.link_prescription(consultation.id, rx.id).await.unwrap();
    let notes = ConsultationPatch { notes: Some("reviewed".into()), ..Default::default() };
    let updated = store.update_consultation(consultation.id, &notes).await.unwrap();
    assert_eq!(updated.prescription_id, Some(rx.id));
    assert_eq!(updated.notes, "reviewed");

    // once the prescription is gone, a later patch cannot bring the link back
    store.delete_prescription(rx.id).await.unwrap();
    let updated = store.update_consultation(consultation.id, &notes).await.unwrap();
    assert_eq!(updated.prescription_id, None);
    assert_eq!(store.get_consultation(consultation.id).await.unwrap(), Some(updated));

    let clear = ConsultationPatch { prescription_id: Some(None), ..Default::default() };
    let rx = prescription();
    store.insert_prescription(&rx).await.unwrap();
    store.link_prescription(consultation.id, rx.id).await.unwrap();
    assert_eq!(store.update_consultation(consultation.id, &clear).await.unwrap().prescription_id, None);
    // the cleared link no longer counts against the prescription
    assert_eq!(store.delete_prescription(rx.id).await.unwrap(), 0);

    let err = store.update_consultation(Uuid::new_v4(), &notes).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "consultation", .. }), "got {:?}", err);
}
