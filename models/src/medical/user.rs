// models/src/medical/user.rs
// Stored users carry a bcrypt hash, never the plaintext password.

use bcrypt::{hash, verify, BcryptError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::medical::medical_profile::Gender;
use crate::medical::role::Role;
use crate::validation::{check_email, check_password, is_blank, not_blank_if_present, require, Validate};

// --- DTO for New User Registration ---
// Used by both self-registration and admin user creation. `date_of_birth` and
// `gender` only seed the medical profile created for patients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// A registration that passed its schema check.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDraft {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub role: Role,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl Validate for NewUser {
    type Valid = UserDraft;

    fn validate(self) -> ValidationResult<UserDraft> {
        require(&[
            ("full_name", is_blank(&self.full_name)),
            ("email", is_blank(&self.email)),
            ("phone_number", is_blank(&self.phone_number)),
            ("password", self.password.as_deref().map_or(true, str::is_empty)),
        ])?;
        let (Some(full_name), Some(email), Some(phone_number), Some(password)) =
            (self.full_name, self.email, self.phone_number, self.password)
        else {
            return Err(ValidationError::missing(["full_name", "email", "phone_number", "password"]));
        };
        let email = email.trim().to_string();
        check_email(&email)?;
        check_password(&password)?;

        Ok(UserDraft {
            full_name: full_name.trim().to_string(),
            email,
            phone_number: phone_number.trim().to_string(),
            password,
            role: self.role.unwrap_or_default(),
            date_of_birth: self.date_of_birth,
            gender: self.gender,
        })
    }
}

// --- Stored User Struct ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Hashes a plaintext password at the given bcrypt cost.
    pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
        hash(password, cost)
    }

    /// Verifies a plaintext password against a stored hash.
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, BcryptError> {
        verify(password, hash)
    }

    /// Creates a new `User` from a checked registration, hashing the password.
    pub fn from_draft(draft: &UserDraft, cost: u32) -> Result<Self, BcryptError> {
        let now = Utc::now();
        let password_hash = Self::hash_password(&draft.password, cost)?;

        Ok(User {
            id: Uuid::new_v4(),
            full_name: draft.full_name.clone(),
            email: draft.email.clone(),
            phone_number: draft.phone_number.clone(),
            password_hash,
            role: draft.role,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    /// Applies the non-credential fields of a checked patch. Password changes
    /// go through `hash_password` at the caller because they need the cost setting.
    pub fn apply_patch(&mut self, patch: &UserPatch) -> ValidationResult<()> {
        if let Some(role) = patch.role {
            if role != self.role {
                return Err(ValidationError::Immutable("role".to_string()));
            }
        }
        if let Some(ref full_name) = patch.full_name {
            self.full_name = full_name.trim().to_string();
        }
        if let Some(ref email) = patch.email {
            self.email = email.trim().to_string();
        }
        if let Some(ref phone_number) = patch.phone_number {
            self.phone_number = phone_number.trim().to_string();
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// The representation handed to API callers. The hash stays server-side.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl Validate for UserPatch {
    type Valid = UserPatch;

    fn validate(self) -> ValidationResult<UserPatch> {
        not_blank_if_present("full_name", &self.full_name)?;
        not_blank_if_present("phone_number", &self.phone_number)?;
        if let Some(ref email) = self.email {
            check_email(email.trim())?;
        }
        if let Some(ref password) = self.password {
            check_password(password)?;
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Validate for Login {
    type Valid = (String, String);

    fn validate(self) -> ValidationResult<(String, String)> {
        require(&[
            ("email", is_blank(&self.email)),
            ("password", self.password.as_deref().map_or(true, str::is_empty)),
        ])?;
        match (self.email, self.password) {
            (Some(email), Some(password)) => Ok((email.trim().to_string(), password)),
            _ => Err(ValidationError::missing(["email", "password"])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> NewUser {
        NewUser {
            full_name: Some("  Ada Lovelace ".into()),
            email: Some("ada@example.com".into()),
            phone_number: Some("555-0101".into()),
            password: Some("analytical".into()),
            ..Default::default()
        }
    }

    #[test]
    fn should_default_role_to_patient() {
        let draft = registration().validate().unwrap();
        assert_eq!(draft.role, Role::Patient);
        assert_eq!(draft.full_name, "Ada Lovelace");
    }

    #[test]
    fn should_report_all_missing_fields() {
        let err = NewUser::default().validate().unwrap_err();
        assert_eq!(err.fields(), vec!["full_name", "email", "phone_number", "password"]);
    }

    #[test]
    fn should_reject_malformed_email_and_short_password() {
        let mut bad_email = registration();
        bad_email.email = Some("ada-at-example".into());
        assert_eq!(bad_email.validate().unwrap_err().fields(), vec!["email"]);

        let mut short = registration();
        short.password = Some("abc".into());
        assert_eq!(short.validate().unwrap_err().fields(), vec!["password"]);
    }

    #[test]
    fn should_hash_and_verify_password() {
        let draft = registration().validate().unwrap();
        let user = User::from_draft(&draft, 4).unwrap();
        assert_ne!(user.password_hash, "analytical");
        assert!(User::verify_password("analytical", &user.password_hash).unwrap());
        assert!(!User::verify_password("wrong-pass", &user.password_hash).unwrap());
    }

    #[test]
    fn should_refuse_role_change() {
        let draft = registration().validate().unwrap();
        let mut user = User::from_draft(&draft, 4).unwrap();
        let patch = UserPatch { role: Some(Role::Admin), ..Default::default() };
        assert_eq!(user.apply_patch(&patch), Err(ValidationError::Immutable("role".into())));

        let same_role = UserPatch { role: Some(Role::Patient), full_name: Some("Ada King".into()), ..Default::default() };
        user.apply_patch(&same_role).unwrap();
        assert_eq!(user.full_name, "Ada King");
    }

    #[test]
    fn public_view_omits_hash() {
        let draft = registration().validate().unwrap();
        let user = User::from_draft(&draft, 4).unwrap();
        let json = serde_json::to_value(user.public()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "Patient");
    }
}
