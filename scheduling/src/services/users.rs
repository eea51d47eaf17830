// scheduling/src/services/users.rs
use std::sync::Arc;

use log::{info, warn};
use uuid::Uuid;

use models::{MedicalProfile, NewUser, PublicUser, Role, User, UserDraft, UserPatch, Validate};
use security::{Action, Caller, ResourceKind, Target};
use storage::EntityStore;

use crate::authorize;
use crate::errors::{ServiceError, ServiceResult};
use crate::services::ServiceSettings;
use crate::workflow::WorkflowEngine;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn EntityStore>,
    workflow: WorkflowEngine,
    settings: ServiceSettings,
}

impl UserService {
    pub fn new(store: Arc<dyn EntityStore>, workflow: WorkflowEngine, settings: ServiceSettings) -> Self {
        UserService { store, workflow, settings }
    }

    /// Stores a new account. Patients get their blank medical profile in the
    /// same call; if that write fails the account is removed again.
    pub(crate) async fn create_account(&self, draft: UserDraft) -> ServiceResult<User> {
        let user = User::from_draft(&draft, self.settings.bcrypt_cost)?;
        self.store.insert_user(&user).await?;

        if user.is_patient() {
            let profile = MedicalProfile::blank_for(user.id, draft.date_of_birth, draft.gender);
            if let Err(e) = self.store.insert_profile(&profile).await {
                warn!("profile creation failed for new patient {}, removing account: {}", user.id, e);
                if let Err(cleanup) = self.store.delete_user(user.id).await {
                    warn!("could not remove account {}: {}", user.id, cleanup);
                }
                return Err(e.into());
            }
        }

        info!("account {} created ({})", user.id, user.role);
        Ok(user)
    }

    /// Creates the configured administrator account at startup unless an
    /// account with that email is already on record.
    pub async fn bootstrap_admin(&self, new: NewUser) -> ServiceResult<Option<PublicUser>> {
        let mut draft = new.validate()?;
        draft.role = Role::Admin;
        if self.store.find_user_by_email(&draft.email).await?.is_some() {
            return Ok(None);
        }
        Ok(Some(self.create_account(draft).await?.public()))
    }

    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<PublicUser>> {
        authorize(caller, Action::List, Target::Kind(ResourceKind::User))?;
        let users = self.store.list_users().await?;
        Ok(users.iter().map(User::public).collect())
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> ServiceResult<PublicUser> {
        let user = self.load(id).await?;
        authorize(caller, Action::Read, Target::User(user.id))?;
        Ok(user.public())
    }

    pub async fn create(&self, caller: &Caller, new: NewUser) -> ServiceResult<PublicUser> {
        let draft = new.validate()?;
        authorize(caller, Action::Create, Target::Kind(ResourceKind::User))?;
        Ok(self.create_account(draft).await?.public())
    }

    pub async fn update(&self, caller: &Caller, id: Uuid, patch: UserPatch) -> ServiceResult<PublicUser> {
        let patch = patch.validate()?;
        let mut user = self.load(id).await?;
        authorize(caller, Action::Update, Target::User(user.id))?;

        user.apply_patch(&patch)?;
        if let Some(ref password) = patch.password {
            user.password_hash = User::hash_password(password, self.settings.bcrypt_cost)?;
        }
        self.store.update_user(&user).await?;
        Ok(user.public())
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        self.workflow.delete_user(caller, id).await
    }

    async fn load(&self, id: Uuid) -> ServiceResult<User> {
        self.store.get_user(id).await?.ok_or(ServiceError::NotFound("user"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{World, caller_of};
    use models::ValidationError;

    fn registration(email: &str, role: Role) -> NewUser {
        NewUser {
            full_name: Some("Grace Hopper".into()),
            email: Some(email.into()),
            phone_number: Some("555-0199".into()),
            password: Some("cobol-rules".into()),
            role: Some(role),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn should_create_profile_for_patients_only() {
        let w = World::new().await;
        let patient = w.user(Role::Patient).await;
        let doctor = w.user(Role::Doctor).await;

        assert!(w.store.get_profile_by_user(patient.id).await.unwrap().is_some());
        assert!(w.store.get_profile_by_user(doctor.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_reject_duplicate_email() {
        let w = World::new().await;
        let users = &w.services.users;
        users.create(&w.admin, registration("grace@example.com", Role::Doctor)).await.unwrap();
        let err = users
            .create(&w.admin, registration("grace@example.com", Role::Patient))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(users.list(&w.admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_restrict_administration_to_admins() {
        let w = World::new().await;
        let doctor = w.user(Role::Doctor).await;
        let patient = w.user(Role::Patient).await;
        let users = &w.services.users;

        assert!(matches!(users.list(&caller_of(&doctor)).await, Err(ServiceError::Denied(_))));
        assert!(matches!(
            users.create(&caller_of(&doctor), registration("new@example.com", Role::Patient)).await,
            Err(ServiceError::Denied(_))
        ));
        assert_eq!(users.get(&caller_of(&patient), patient.id).await.unwrap().id, patient.id);
        assert!(matches!(users.get(&caller_of(&patient), doctor.id).await, Err(ServiceError::Denied(_))));
    }

    #[tokio::test]
    async fn should_keep_role_and_rehash_password_on_update() {
        let w = World::new().await;
        let patient = w.user(Role::Patient).await;
        let users = &w.services.users;

        let promote = UserPatch { role: Some(Role::Admin), ..Default::default() };
        let err = users.update(&w.admin, patient.id, promote).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::Immutable(_))));

        let reset = UserPatch { password: Some("brand-new-pass".into()), ..Default::default() };
        users.update(&w.admin, patient.id, reset).await.unwrap();
        let stored = w.store.get_user(patient.id).await.unwrap().unwrap();
        assert!(User::verify_password("brand-new-pass", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn should_recheck_email_uniqueness_on_update() {
        let w = World::new().await;
        let (a, b) = (w.user(Role::Doctor).await, w.user(Role::Doctor).await);
        let patch = UserPatch { email: Some(b.email.clone()), ..Default::default() };
        let err = w.services.users.update(&w.admin, a.id, patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_drop_profile_with_patient() {
        let w = World::new().await;
        let patient = w.user(Role::Patient).await;
        w.services.users.delete(&w.admin, patient.id).await.unwrap();
        assert!(w.store.get_user(patient.id).await.unwrap().is_none());
        assert!(w.store.get_profile_by_user(patient.id).await.unwrap().is_none());
        assert!(matches!(
            w.services.users.get(&w.admin, patient.id).await,
            Err(ServiceError::NotFound("user"))
        ));
    }

    #[tokio::test]
    async fn should_bootstrap_admin_once() {
        let w = World::new().await;
        let users = &w.services.users;
        let admin = users
            .bootstrap_admin(registration("root@example.com", Role::Patient))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(w.store.get_profile_by_user(admin.id).await.unwrap().is_none());

        let again = users.bootstrap_admin(registration("root@example.com", Role::Admin)).await.unwrap();
        assert!(again.is_none());
    }
}
