// rest_api/src/handlers/auth.rs

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use models::{Login, NewUser, PublicUser};
use scheduling::AuthSession;

use crate::AppState;
use crate::errors::ApiResult;
use crate::extract::Authenticated;
use crate::response::{Reply, created, ok};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Reply<AuthSession>)> {
    let Json(new) = payload?;
    Ok(created(state.services.auth.register(new).await?))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Login>, JsonRejection>,
) -> ApiResult<Reply<AuthSession>> {
    let Json(login) = payload?;
    Ok(ok(state.services.auth.login(login).await?))
}

pub async fn me(State(state): State<AppState>, Authenticated(caller): Authenticated) -> ApiResult<Reply<PublicUser>> {
    Ok(ok(state.services.auth.me(&caller).await?))
}
