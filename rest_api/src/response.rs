// rest_api/src/response.rs
//! The `{success, data, count, message}` body every endpoint answers with.

use axum::{Json, http::StatusCode};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type Reply<T> = Json<Envelope<T>>;

pub fn ok<T: Serialize>(data: T) -> Reply<T> {
    Json(Envelope { success: true, data: Some(data), count: None, message: None })
}

pub fn listed<T: Serialize>(items: Vec<T>) -> Reply<Vec<T>> {
    let count = items.len();
    Json(Envelope { success: true, data: Some(items), count: Some(count), message: None })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Reply<T>) {
    (StatusCode::CREATED, ok(data))
}

/// Deletions answer 200 with an empty object under `data`.
pub fn deleted() -> Reply<Value> {
    ok(json!({}))
}

pub fn message(text: impl Into<String>) -> Reply<Value> {
    Json(Envelope { success: true, data: None, count: None, message: Some(text.into()) })
}
