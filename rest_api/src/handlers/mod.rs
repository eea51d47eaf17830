// rest_api/src/handlers/mod.rs

pub mod appointments;
pub mod auth;
pub mod consultations;
pub mod facilities;
pub mod medical_profiles;
pub mod prescriptions;
pub mod users;

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

use crate::response::{Reply, message, ok};

// Handler for the /api/v1/health endpoint
pub async fn health() -> Reply<Value> {
    message("Clinic API is healthy")
}

// Handler for the /api/v1/version endpoint
pub async fn version() -> Reply<Value> {
    ok(json!({ "version": env!("CARGO_PKG_VERSION"), "api_level": 1 }))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "success": false, "message": "Route not found" })))
}
