//! User account endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::dispatch::{check_collection, check_object_strict};
use super::extract::{body, path_id};
use super::views::{user_view, ActivityView, UserView};
use super::AppState;
use crate::catalog::{validate, UserPatch};
use crate::error::{AppError, AppResult};
use crate::identity::{Principal, RequestContext};
use crate::policy::{AccessPolicy, Action, Method};
use crate::security;
use crate::storage::ACTIVITY_LIMIT;

pub const UPDATE_POLICY: AccessPolicy = AccessPolicy::OwnerOrAdminWrite;
pub const DELETE_POLICY: AccessPolicy = AccessPolicy::AdminWriteOnly;
pub const ACTIVITY_POLICY: AccessPolicy = AccessPolicy::AdminOrOwnerFullAccess;

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdatePayload {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl UserUpdatePayload {
    fn validate(self, partial: bool) -> AppResult<UserPatch> {
        let mut v = validate::Validator::new();
        if !partial && self.email.is_none() {
            v.fail("email", "this field is required");
        }
        let email = self.email.and_then(|e| v.check("email", validate::email(&e)));
        v.finish()?;
        Ok(UserPatch {
            email,
            first_name: self.first_name.map(|s| s.trim().to_string()),
            last_name: self.last_name.map(|s| s.trim().to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordPayload {
    #[serde(default)]
    old_password: Option<String>,
    #[serde(default)]
    new_password: Option<String>,
    #[serde(default)]
    new_password_confirm: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PasswordChanged {
    message: &'static str,
    access: String,
    refresh: String,
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<UserView>>> {
    let mut store = state.store.0.lock();
    let users = store.list_users();
    let mut out = Vec::with_capacity(users.len());
    for u in &users {
        out.push(user_view(&mut store, &state.config, u)?);
    }
    Ok(Json(out))
}

pub async fn retrieve(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<UserView>> {
    let mut store = state.store.0.lock();
    let user = store.get_user(path_id(&id, "user")?)?;
    Ok(Json(user_view(&mut store, &state.config, &user)?))
}

async fn update(state: AppState, ctx: RequestContext, id: String, action: Action, payload: Result<Json<UserUpdatePayload>, JsonRejection>) -> AppResult<Json<UserView>> {
    let method = action.method();
    check_collection(UPDATE_POLICY, &ctx, &method)?;
    let mut store = state.store.0.lock();
    let target = store.get_user(path_id(&id, "user")?)?;
    check_object_strict(UPDATE_POLICY, &ctx, &method, &target, "user")?;
    let patch = body(payload)?.validate(action == Action::PartialUpdate)?;
    let user = store.update_user(target.id, patch)?;
    info!(target: "serieshub::users", "updated user id={} by identity={:?} request={}", user.id, ctx.identity, ctx.request_id);
    Ok(Json(user_view(&mut store, &state.config, &user)?))
}

pub async fn put(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<UserUpdatePayload>, JsonRejection>,
) -> AppResult<Json<UserView>> {
    update(state, ctx, id, Action::Update, payload).await
}

pub async fn patch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<UserUpdatePayload>, JsonRejection>,
) -> AppResult<Json<UserView>> {
    update(state, ctx, id, Action::PartialUpdate, payload).await
}

fn delete_account(state: &AppState, user_id: u64, ctx: &RequestContext) -> AppResult<()> {
    state.store.0.lock().delete_user(user_id)?;
    let revoked = state.sessions.revoke_user(user_id);
    info!(target: "serieshub::users", "deleted user id={} revoked_tokens={} by identity={:?} request={}", user_id, revoked, ctx.identity, ctx.request_id);
    Ok(())
}

pub async fn destroy(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<StatusCode> {
    let method = Action::Destroy.method();
    check_collection(DELETE_POLICY, &ctx, &method)?;
    let target = state.store.0.lock().get_user(path_id(&id, "user")?)?;
    check_object_strict(DELETE_POLICY, &ctx, &method, &target, "user")?;
    delete_account(&state, target.id, &ctx)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<UserView>> {
    let user = ctx.require_user()?;
    let mut store = state.store.0.lock();
    Ok(Json(user_view(&mut store, &state.config, user)?))
}

pub async fn delete_me(State(state): State<AppState>, ctx: RequestContext) -> AppResult<StatusCode> {
    let id = ctx.require_user()?.id;
    delete_account(&state, id, &ctx)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Checks the current password, stores the new hash and replaces every token
/// the user holds with a fresh pair.
pub async fn change_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<ChangePasswordPayload>, JsonRejection>,
) -> AppResult<Json<PasswordChanged>> {
    let user = ctx.require_user()?;
    let p = body(payload)?;
    let mut v = validate::Validator::new();
    let old = v.check("old_password", validate::required(p.old_password));
    let new = v.check("new_password", validate::required(p.new_password).and_then(|pw| validate::password(&pw)));
    let confirm = v.check("new_password_confirm", validate::required(p.new_password_confirm));
    if let (Some(n), Some(c)) = (&new, &confirm) {
        v.check("new_password", validate::passwords_match(n, c));
    }
    if let Some(o) = &old {
        if !security::verify_password(&user.password_hash, o) {
            v.fail("old_password", "current password is incorrect");
        }
    }
    v.finish()?;
    let Some(new) = new else {
        return Err(AppError::internal("validator_state", "validator passed with missing fields"));
    };

    let hash = security::hash_password(&new)?;
    state.store.0.lock().set_password_hash(user.id, hash)?;
    let revoked = state.sessions.revoke_user(user.id);
    let tokens = state.sessions.issue(Principal::for_user(user))?;
    info!(target: "serieshub::auth", "password changed user={} revoked_tokens={} request={}", user.id, revoked, ctx.request_id);
    Ok(Json(PasswordChanged { message: "password changed", access: tokens.access, refresh: tokens.refresh }))
}

/// Recent activity of a user: visible to that user and to admins only.
pub async fn activities(State(state): State<AppState>, ctx: RequestContext, method: axum::http::Method, Path(id): Path<String>) -> AppResult<Json<Vec<ActivityView>>> {
    let method = Method::from(&method);
    check_collection(ACTIVITY_POLICY, &ctx, &method)?;
    let store = state.store.0.lock();
    let target = store.get_user(path_id(&id, "user")?)?;
    check_object_strict(ACTIVITY_POLICY, &ctx, &method, &target, "user")?;
    let list = store.activities_for(target.id, ACTIVITY_LIMIT);
    Ok(Json(list.into_iter().map(ActivityView::from).collect()))
}
