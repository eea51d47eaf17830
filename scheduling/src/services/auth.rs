// scheduling/src/services/auth.rs
//! Registration, login and token resolution: the boundary where a bearer
//! token becomes a [`Caller`].

use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use models::{Login, NewUser, PublicUser, Role, User, Validate, ValidationError};
use security::{AuthError, Caller, TokenService};
use storage::EntityStore;

use crate::errors::{ServiceError, ServiceResult};
use crate::services::UserService;

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn EntityStore>,
    users: UserService,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Arc<dyn EntityStore>, users: UserService, tokens: TokenService) -> Self {
        AuthService { store, users, tokens }
    }

    /// Public sign-up. Administrator accounts can only be made by an administrator.
    pub async fn register(&self, new: NewUser) -> ServiceResult<AuthSession> {
        let draft = new.validate()?;
        if draft.role == Role::Admin {
            return Err(ValidationError::invalid("role", "Admin accounts cannot be self-registered").into());
        }
        let user = self.users.create_account(draft).await?;
        self.session_for(&user)
    }

    pub async fn login(&self, login: Login) -> ServiceResult<AuthSession> {
        let (email, password) = login.validate()?;
        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                debug!("login for unknown email {}", email);
                return Err(AuthError::InvalidCredentials.into());
            }
        };
        if !User::verify_password(&password, &user.password_hash)? {
            debug!("wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials.into());
        }
        info!("user {} logged in", user.id);
        self.session_for(&user)
    }

    pub async fn me(&self, caller: &Caller) -> ServiceResult<PublicUser> {
        let user = self.store.get_user(caller.id).await?.ok_or(ServiceError::NotFound("user"))?;
        Ok(user.public())
    }

    /// Turns a bearer token into a caller. The account must still exist and
    /// its stored role wins over the one in the token.
    pub async fn resolve(&self, token: &str) -> ServiceResult<Caller> {
        let claimed = self.tokens.verify(token)?;
        let user = self
            .store
            .get_user(claimed.id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("User no longer exists".to_string()))?;
        Ok(Caller::new(user.id, user.role))
    }

    fn session_for(&self, user: &User) -> ServiceResult<AuthSession> {
        let token = self.tokens.issue(user.id, user.role)?;
        Ok(AuthSession { token, user: user.public() })
    }
}
