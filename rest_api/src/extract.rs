// rest_api/src/extract.rs

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use log::debug;

use security::{Caller, bearer_token};

use crate::AppState;
use crate::errors::ApiError;

/// The caller named by the request's `Authorization: Bearer` token.
///
/// Rejects with 401 when the header is missing, the token does not verify,
/// or the account it names no longer exists.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiError::MissingToken)?;

        let caller = state.services.auth.resolve(token).await.map_err(|e| {
            debug!("rejected bearer token on {}: {}", parts.uri.path(), e);
            ApiError::from(e)
        })?;
        Ok(Authenticated(caller))
    }
}
