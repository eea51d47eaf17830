// security/src/tokens.rs
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use models::Role;

use crate::Caller;

/// Claims for JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user id)
    pub role: Role,
    pub iat: u64,    // Issued at
    pub exp: u64,    // Expiration time
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authorized to access this route")]
    MissingToken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256 tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours as i64),
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp().max(0) as u64,
            exp: (now + self.ttl).timestamp().max(0) as u64,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Decodes and validates a token, yielding the caller it names.
    pub fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|e| AuthError::InvalidToken(format!("bad subject: {}", e)))?;
        Ok(Caller::new(id, data.claims.role))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    #[test]
    fn issued_token_round_trips_to_caller() {
        let tokens = TokenService::new(SECRET, 1);
        let id = Uuid::new_v4();
        let token = tokens.issue(id, Role::Doctor).unwrap();
        let caller = tokens.verify(&token).unwrap();
        assert_eq!(caller, Caller::new(id, Role::Doctor));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = TokenService::new("another-secret-another-secret-another", 1)
            .issue(Uuid::new_v4(), Role::Admin)
            .unwrap();
        assert!(matches!(
            TokenService::new(SECRET, 1).verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let past = (Utc::now() - Duration::hours(3)).timestamp() as u64;
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: Role::Patient,
            iat: past,
            exp: past + 60,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert!(TokenService::new(SECRET, 1).verify(&token).is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
