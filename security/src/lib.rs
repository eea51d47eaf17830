// security/src/lib.rs
//! Who is calling, and what they may do.
//!
//! `tokens` turns a bearer token into a [`Caller`]; `policy` decides whether
//! that caller may perform an action on a loaded record.

pub mod policy;
pub mod tokens;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use models::Role;

pub use policy::{Action, Decision, ResourceKind, Scope, Target, decide, list_scope};
pub use tokens::{AuthError, Claims, TokenService, bearer_token};

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Caller { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }
}
