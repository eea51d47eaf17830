// rest_api/src/lib.rs
//! HTTP surface of the clinic API: the `/api/v1` router, its shared state and
//! the server loop.

pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error as AnyhowError};
use axum::{
    Json, Router,
    http::{Method, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use log::info;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

use models::NewUser;
use scheduling::{ServiceSettings, Services};
use security::TokenService;
use storage::EntityStore;

pub use crate::config::{AppConfig, RunMode, load_config};
use crate::errors::FailureDetail;
use crate::handlers::{appointments, auth, consultations, facilities, medical_profiles, prescriptions, users};

// Shared state for the Axum application
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub run_mode: RunMode,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, config: &AppConfig) -> Self {
        let tokens = TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);
        let settings = ServiceSettings { bcrypt_cost: config.auth.bcrypt_cost };
        AppState { services: Services::new(store, tokens, settings), run_mode: config.environment }
    }

    /// Creates the configured administrator if it does not exist yet.
    pub async fn bootstrap(&self, config: &AppConfig) -> Result<(), AnyhowError> {
        let Some(admin) = config.admin.as_ref() else {
            return Ok(());
        };
        let new = NewUser {
            full_name: Some(admin.full_name.clone()),
            email: Some(admin.email.clone()),
            phone_number: Some(admin.phone_number.clone()),
            password: Some(admin.password.clone()),
            ..Default::default()
        };
        if let Some(created) = self
            .services
            .users
            .bootstrap_admin(new)
            .await
            .context("Failed to create the configured administrator")?
        {
            info!("Created administrator account {} ({})", created.id, created.email);
        }
        Ok(())
    }
}

// Outside production, put the detail of a 500 back into the body.
async fn expose_failure_detail(response: Response) -> Response {
    match response.extensions().get::<FailureDetail>().cloned() {
        Some(FailureDetail(detail)) => {
            let status = response.status();
            let body = Json(json!({ "success": false, "message": "Server Error", "error": detail }));
            (status, body).into_response()
        }
        None => response,
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Users (admin)
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", get(users::get).put(users::update).delete(users::delete))
        // Appointments
        .route("/appointments", get(appointments::list).post(appointments::create))
        .route("/appointments/me", get(appointments::mine))
        .route("/appointments/filter", get(appointments::filter))
        .route("/appointments/stats", get(appointments::stats))
        .route("/appointments/reminders", get(appointments::reminders))
        .route(
            "/appointments/:id",
            get(appointments::get).put(appointments::update).delete(appointments::delete),
        )
        .route("/appointments/:id/reminder-sent", put(appointments::reminder_sent))
        // Consultations
        .route("/consultations", get(consultations::list).post(consultations::create))
        .route("/consultations/me", get(consultations::mine))
        .route(
            "/consultations/:id",
            get(consultations::get).put(consultations::update).delete(consultations::delete),
        )
        // Prescriptions
        .route("/prescriptions", get(prescriptions::list).post(prescriptions::create))
        .route("/prescriptions/me", get(prescriptions::mine))
        .route("/prescriptions/active/:patient_id", get(prescriptions::active))
        .route(
            "/prescriptions/:id",
            get(prescriptions::get).put(prescriptions::update).delete(prescriptions::delete),
        )
        // Medical profiles
        .route("/medical-profiles", get(medical_profiles::list).post(medical_profiles::create))
        .route("/medical-profiles/me", get(medical_profiles::mine))
        .route(
            "/medical-profiles/:id",
            get(medical_profiles::get).put(medical_profiles::update).delete(medical_profiles::delete),
        )
        // Facilities
        .route("/facilities", get(facilities::list).post(facilities::create))
        .route("/facilities/radius/:lat/:lng/:distance", get(facilities::within_radius))
        .route(
            "/facilities/:id",
            get(facilities::get).put(facilities::update).delete(facilities::delete),
        );

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any);

    let expose_detail = !state.run_mode.is_production();
    let app = Router::new()
        .nest("/api/v1", api)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(cors);

    if expose_detail {
        app.layer(middleware::map_response(expose_failure_detail))
    } else {
        app
    }
}

// Main function to start the REST API server
pub async fn start_server(
    config: &AppConfig,
    state: AppState,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), AnyhowError> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to address: {}", addr))?;
    info!("Clinic API listening on {} ({:?} mode)", addr, config.environment);

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
            info!("Received shutdown signal.");
        })
        .await
        .context("REST API server failed to start or run")?;

    info!("Clinic API server stopped.");
    Ok(())
}
