//! Token endpoints and account registration.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::extract::body;
use super::views::{user_view, UserView};
use super::AppState;
use crate::catalog::{validate, NewUser};
use crate::error::{AppError, AppResult};
use crate::identity::{AuthProvider, LoginRequest, RequestContext};
use crate::security;

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshPayload { refresh: String }

#[derive(Debug, Deserialize)]
pub struct VerifyPayload { token: String }

#[derive(Debug, Default, Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    password_confirm: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    access: String,
    refresh: String,
    user: UserView,
}

fn login_request(p: LoginPayload) -> LoginRequest {
    LoginRequest { username: p.username, password: p.password, ip: None }
}

/// `POST /api/token/`
pub async fn obtain_pair(State(state): State<AppState>, payload: Result<Json<LoginPayload>, JsonRejection>) -> AppResult<Json<Value>> {
    let resp = state.auth().login(&login_request(body(payload)?))?;
    Ok(Json(json!({ "access": resp.tokens.access, "refresh": resp.tokens.refresh })))
}

/// `POST /api/token/refresh/`
pub async fn refresh(State(state): State<AppState>, payload: Result<Json<RefreshPayload>, JsonRejection>) -> AppResult<Json<Value>> {
    let p = body(payload)?;
    let access = state
        .sessions
        .refresh(&p.refresh)?
        .ok_or_else(|| AppError::auth("token_not_valid", "token is invalid or expired"))?;
    Ok(Json(json!({ "access": access })))
}

/// `POST /api/token/verify/`
pub async fn verify(State(state): State<AppState>, payload: Result<Json<VerifyPayload>, JsonRejection>) -> AppResult<Json<Value>> {
    let p = body(payload)?;
    if state.sessions.verify(&p.token) {
        Ok(Json(json!({})))
    } else {
        Err(AppError::auth("token_not_valid", "token is invalid or expired"))
    }
}

/// `POST /api/v1/auth/login/`
pub async fn login(State(state): State<AppState>, payload: Result<Json<LoginPayload>, JsonRejection>) -> AppResult<Json<SessionResponse>> {
    let resp = state.auth().login(&login_request(body(payload)?))?;
    let mut store = state.store.0.lock();
    let user = user_view(&mut store, &state.config, &resp.user)?;
    Ok(Json(SessionResponse { access: resp.tokens.access, refresh: resp.tokens.refresh, user }))
}

/// `POST /api/v1/auth/logout/`
pub async fn logout(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Value>> {
    let user = ctx.require_user()?;
    if let Some(token) = &ctx.token {
        state.sessions.logout(token);
    }
    info!(target: "serieshub::auth", "logout user={} id={}", user.username, user.id);
    Ok(Json(json!({ "status": "ok" })))
}

/// `POST /api/v1/auth/register/`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let p = body(payload)?;
    let mut v = validate::Validator::new();
    let username = v.check("username", validate::required(p.username).and_then(|u| validate::username(&u)));
    let email = v.check("email", validate::required(p.email).and_then(|e| validate::email(&e)));
    let password = v.check("password", validate::required(p.password).and_then(|pw| validate::password(&pw)));
    let confirm = v.check("password_confirm", validate::required(p.password_confirm));
    if let (Some(pw), Some(c)) = (&password, &confirm) {
        v.check("password", validate::passwords_match(pw, c));
    }
    v.finish()?;
    let (Some(username), Some(email), Some(password)) = (username, email, password) else {
        return Err(AppError::internal("validator_state", "validator passed with missing fields"));
    };

    let new = NewUser {
        username,
        email,
        first_name: p.first_name.unwrap_or_default().trim().to_string(),
        last_name: p.last_name.unwrap_or_default().trim().to_string(),
        password_hash: security::hash_password(&password)?,
        is_admin: false,
    };
    let user = state.store.0.lock().create_user(new)?;
    info!(target: "serieshub::auth", "registered user={} id={}", user.username, user.id);

    let tokens = state.auth().start_session(&user)?;
    let mut store = state.store.0.lock();
    let user = store.get_user(user.id)?;
    let view = user_view(&mut store, &state.config, &user)?;
    Ok((StatusCode::CREATED, Json(SessionResponse { access: tokens.access, refresh: tokens.refresh, user: view })))
}
