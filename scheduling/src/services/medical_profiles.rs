// scheduling/src/services/medical_profiles.rs
use std::sync::Arc;

use log::info;
use uuid::Uuid;

use models::{MedicalProfile, MedicalProfilePatch, NewMedicalProfile, Validate, ValidationError};
use security::{Action, Caller, ResourceKind, Scope, Target, list_scope};
use storage::EntityStore;

use crate::errors::{ServiceError, ServiceResult};
use crate::{authorize, require_participant};

#[derive(Clone)]
pub struct MedicalProfileService {
    store: Arc<dyn EntityStore>,
}

impl MedicalProfileService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        MedicalProfileService { store }
    }

    /// Doctors and admins see every profile, patients only their own.
    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<MedicalProfile>> {
        authorize(caller, Action::List, Target::Kind(ResourceKind::MedicalProfile))?;
        let owner = match list_scope(caller, ResourceKind::MedicalProfile) {
            Scope::Patient(id) => Some(id),
            Scope::All | Scope::Doctor(_) => None,
        };
        Ok(self.store.list_profiles(owner).await?)
    }

    pub async fn mine(&self, caller: &Caller) -> ServiceResult<MedicalProfile> {
        require_participant(caller)?;
        self.store
            .get_profile_by_user(caller.id)
            .await?
            .ok_or(ServiceError::NotFound("medical profile"))
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> ServiceResult<MedicalProfile> {
        let profile = self.load(id).await?;
        authorize(caller, Action::Read, Target::Profile(&profile))?;
        Ok(profile)
    }

    pub async fn create(&self, caller: &Caller, new: NewMedicalProfile) -> ServiceResult<MedicalProfile> {
        let draft = new.validate()?;
        authorize(caller, Action::Create, Target::Kind(ResourceKind::MedicalProfile))?;

        let owner = self.store.get_user(draft.user_id).await?.ok_or(ServiceError::NotFound("user"))?;
        if !owner.is_patient() {
            return Err(ValidationError::wrong_reference("user_id", "Patient").into());
        }
        let profile = MedicalProfile::from_draft(draft);
        self.store.insert_profile(&profile).await?;
        info!("medical profile {} created for patient {}", profile.id, owner.id);
        Ok(profile)
    }

    pub async fn update(&self, caller: &Caller, id: Uuid, patch: MedicalProfilePatch) -> ServiceResult<MedicalProfile> {
        let mut profile = self.load(id).await?;
        authorize(caller, Action::Update, Target::Profile(&profile))?;
        patch.check_against(&profile)?;

        profile.apply_patch(patch);
        self.store.update_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        let profile = self.load(id).await?;
        authorize(caller, Action::Delete, Target::Profile(&profile))?;
        self.store.delete_profile(id).await?;
        info!("medical profile {} deleted by {}", id, caller.id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<MedicalProfile> {
        self.store
            .get_profile(id)
            .await?
            .ok_or(ServiceError::NotFound("medical profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{World, caller_of};
    use chrono::NaiveDate;
    use models::{BloodType, Gender, Role};

    fn profile_for(user_id: Uuid) -> NewMedicalProfile {
        NewMedicalProfile {
            user_id: Some(user_id),
            date_of_birth: NaiveDate::from_ymd_opt(1984, 3, 9),
            gender: Some(Gender::Female),
            blood_type: Some(BloodType::ONegative),
            allergies: vec!["penicillin".into()],
            chronic_conditions: vec![],
        }
    }

    #[tokio::test]
    async fn should_show_patients_only_their_own() {
        let w = World::new().await;
        let (p1, p2, doctor) = (w.user(Role::Patient).await, w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let profiles = &w.services.profiles;

        let mine = profiles.mine(&caller_of(&p1)).await.unwrap();
        assert_eq!(mine.user_id, p1.id);
        assert_eq!(mine.blood_type, BloodType::Unknown);
        assert_eq!(profiles.list(&caller_of(&p1)).await.unwrap(), vec![mine.clone()]);
        assert_eq!(profiles.list(&caller_of(&doctor)).await.unwrap().len(), 2);

        let theirs = profiles.mine(&caller_of(&p2)).await.unwrap();
        assert!(matches!(profiles.get(&caller_of(&p1), theirs.id).await, Err(ServiceError::Denied(_))));
        assert_eq!(profiles.get(&caller_of(&doctor), theirs.id).await.unwrap().id, theirs.id);
        assert!(matches!(profiles.mine(&caller_of(&doctor)).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(profiles.mine(&w.admin).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn should_allow_one_profile_per_patient() {
        let w = World::new().await;
        let patient = w.user(Role::Patient).await;
        let profiles = &w.services.profiles;

        let err = profiles.create(&w.admin, profile_for(patient.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let existing = profiles.mine(&caller_of(&patient)).await.unwrap();
        profiles.delete(&w.admin, existing.id).await.unwrap();
        let created = profiles.create(&w.admin, profile_for(patient.id)).await.unwrap();
        assert_eq!(created.allergies, vec!["penicillin".to_string()]);
    }

    #[tokio::test]
    async fn should_restrict_creation_to_admin_for_patients() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let profiles = &w.services.profiles;

        assert!(matches!(
            profiles.create(&caller_of(&patient), profile_for(patient.id)).await,
            Err(ServiceError::Denied(_))
        ));
        match profiles.create(&w.admin, profile_for(doctor.id)).await {
            Err(ServiceError::Validation(v)) => assert_eq!(v.fields(), vec!["user_id"]),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn should_let_owner_update_but_not_rebind() {
        let w = World::new().await;
        let (patient, doctor) = (w.user(Role::Patient).await, w.user(Role::Doctor).await);
        let profiles = &w.services.profiles;
        let profile = profiles.mine(&caller_of(&patient)).await.unwrap();

        let patch = MedicalProfilePatch { blood_type: Some(BloodType::APositive), ..Default::default() };
        assert!(matches!(
            profiles.update(&caller_of(&doctor), profile.id, patch.clone()).await,
            Err(ServiceError::Denied(_))
        ));
        let updated = profiles.update(&caller_of(&patient), profile.id, patch).await.unwrap();
        assert_eq!(updated.blood_type, BloodType::APositive);

        let rebind = MedicalProfilePatch { user_id: Some(doctor.id), ..Default::default() };
        assert!(matches!(
            profiles.update(&caller_of(&patient), profile.id, rebind).await,
            Err(ServiceError::Validation(ValidationError::Immutable(_)))
        ));
    }
}
