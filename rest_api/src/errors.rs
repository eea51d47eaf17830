// rest_api/src/errors.rs

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use serde_json::json;
use thiserror::Error;

use scheduling::ServiceError;

/// Detail of a server-side failure, carried on the response so the
/// development-mode layer can put it back into the body.
#[derive(Debug, Clone)]
pub struct FailureDetail(pub String);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Not authorized to access this route")]
    MissingToken,
    #[error("Malformed request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(e) => match e {
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Denied(_) => StatusCode::FORBIDDEN,
                ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                ServiceError::Validation(_)
                | ServiceError::InvalidState(_)
                | ServiceError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::StoreFailure(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self);
            let body = Json(json!({ "success": false, "message": "Server Error" }));
            let mut response = (status, body).into_response();
            response.extensions_mut().insert(FailureDetail(self.to_string()));
            return response;
        }

        let mut body = json!({ "success": false, "message": self.to_string() });
        if let ApiError::Service(ServiceError::Validation(ref v)) = self {
            body["fields"] = json!(v.fields());
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
