//! Profile endpoints: the caller's own profile at `/api/v1/profile/` and any
//! user's profile at `/api/v1/profiles/{user_id}/`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::dispatch::{check, check_collection, check_object_strict};
use super::extract::{body, path_id};
use super::views::{FormattedProfile, ProfileView, Render};
use super::AppState;
use crate::catalog::{double_option, validate, Genre, ImageUpload, ProfilePatch, UserPatch};
use crate::error::AppResult;
use crate::identity::RequestContext;
use crate::policy::{AccessPolicy, Action, Method};

pub const POLICY: AccessPolicy = AccessPolicy::OwnerOrAdminWrite;

#[derive(Debug, Default, Deserialize)]
pub struct ProfilePayload {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    birth_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    email_notifications: Option<bool>,
    #[serde(default)]
    favorite_genres: Option<Vec<String>>,
}

impl ProfilePayload {
    /// Split into account and profile changes. Every field is optional.
    fn validate(self) -> AppResult<(UserPatch, ProfilePatch)> {
        let mut v = validate::Validator::new();
        let email = self.email.and_then(|e| v.check("email", validate::email(&e)));
        let bio = self.bio.and_then(|b| v.check("bio", validate::bio(&b)));
        let website = self.website.and_then(|w| v.check("website", validate::website(&w)));
        let favorite_genres = match self.favorite_genres {
            Some(keys) => {
                let mut out: Vec<Genre> = Vec::with_capacity(keys.len());
                for k in keys {
                    if let Some(g) = v.check("favorite_genres", Genre::from_key(&k).ok_or_else(|| format!("\"{k}\" is not a valid choice"))) {
                        if !out.contains(&g) { out.push(g); }
                    }
                }
                Some(out)
            }
            None => None,
        };
        v.finish()?;
        let user = UserPatch {
            email,
            first_name: self.first_name.map(|s| s.trim().to_string()),
            last_name: self.last_name.map(|s| s.trim().to_string()),
        };
        let profile = ProfilePatch {
            bio,
            avatar: None,
            birth_date: self.birth_date,
            website,
            email_notifications: self.email_notifications,
            favorite_genres,
        };
        Ok((user, profile))
    }
}

#[derive(Debug, Deserialize)]
pub struct AvatarPayload {
    avatar: ImageUpload,
}

fn formatted(state: &AppState, user_id: u64) -> AppResult<FormattedProfile> {
    let mut store = state.store.0.lock();
    let user = store.get_user(user_id)?;
    let profile = store.profile(user_id)?;
    Ok(Render::new(&store, &state.config).formatted_profile(&user, &profile))
}

/// `GET /api/v1/profile/`
pub async fn show_own(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<FormattedProfile>> {
    let user = ctx.require_user()?;
    Ok(Json(formatted(&state, user.id)?))
}

/// `POST /api/v1/profile/`: partial update of the caller's account and profile.
pub async fn update_own(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<ProfilePayload>, JsonRejection>,
) -> AppResult<Json<FormattedProfile>> {
    let method = Method::Post;
    let user = ctx.require_user()?;
    {
        let mut store = state.store.0.lock();
        let profile = store.profile(user.id)?;
        check(POLICY, &ctx, &method, &profile)?;
        let (user_patch, profile_patch) = body(payload)?.validate()?;
        store.update_user(user.id, user_patch)?;
        store.update_profile(user.id, profile_patch)?;
    }
    info!(target: "serieshub::profile", "profile updated user={} request={}", user.id, ctx.request_id);
    Ok(Json(formatted(&state, user.id)?))
}

/// `POST /api/v1/profile/avatar/`
pub async fn set_avatar(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<AvatarPayload>, JsonRejection>,
) -> AppResult<Json<FormattedProfile>> {
    let user = ctx.require_user()?;
    {
        let mut store = state.store.0.lock();
        let profile = store.profile(user.id)?;
        check(POLICY, &ctx, &Method::Post, &profile)?;
        let upload = body(payload)?.avatar;
        let mut v = validate::Validator::new();
        let name = v.check("avatar", validate::image(&upload.name, upload.size));
        v.finish()?;
        store.update_profile(user.id, ProfilePatch { avatar: Some(name), ..ProfilePatch::default() })?;
    }
    Ok(Json(formatted(&state, user.id)?))
}

/// `DELETE /api/v1/profile/avatar/`
pub async fn clear_avatar(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<FormattedProfile>> {
    let user = ctx.require_user()?;
    {
        let mut store = state.store.0.lock();
        let profile = store.profile(user.id)?;
        check(POLICY, &ctx, &Method::Delete, &profile)?;
        store.update_profile(user.id, ProfilePatch { avatar: Some(None), ..ProfilePatch::default() })?;
    }
    Ok(Json(formatted(&state, user.id)?))
}

/// `GET /api/v1/profiles/{user_id}/`
pub async fn retrieve(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<ProfileView>> {
    let method = Action::Retrieve.method();
    check_collection(POLICY, &ctx, &method)?;
    let mut store = state.store.0.lock();
    let profile = store.profile(path_id(&id, "user")?)?;
    check_object_strict(POLICY, &ctx, &method, &profile, "profile")?;
    Ok(Json(Render::new(&store, &state.config).profile(&profile)))
}

/// `PATCH /api/v1/profiles/{user_id}/`: profile fields only.
pub async fn patch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<ProfilePayload>, JsonRejection>,
) -> AppResult<Json<ProfileView>> {
    let method = Action::PartialUpdate.method();
    check_collection(POLICY, &ctx, &method)?;
    let mut store = state.store.0.lock();
    let profile = store.profile(path_id(&id, "user")?)?;
    check_object_strict(POLICY, &ctx, &method, &profile, "profile")?;
    let (_, profile_patch) = body(payload)?.validate()?;
    let profile = store.update_profile(profile.user_id, profile_patch)?;
    info!(target: "serieshub::profile", "profile patched user={} by identity={:?} request={}", profile.user_id, ctx.identity, ctx.request_id);
    Ok(Json(Render::new(&store, &state.config).profile(&profile)))
}
