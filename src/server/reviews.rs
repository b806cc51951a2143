//! Review endpoints. Authors edit their own reviews; admins may moderate any.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use super::dispatch::{check_collection, check_object_strict};
use super::extract::{body, path_id};
use super::views::{Render, ReviewView};
use super::AppState;
use crate::catalog::{ActivityKind, ReviewInput};
use crate::error::AppResult;
use crate::identity::RequestContext;
use crate::policy::{AccessPolicy, Action};

pub const COLLECTION_POLICY: AccessPolicy = AccessPolicy::ReadOnlyForEveryoneElseWrite;
pub const OBJECT_POLICY: AccessPolicy = AccessPolicy::OwnerOrAdminWrite;

pub async fn list(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<ReviewView>>> {
    check_collection(COLLECTION_POLICY, &ctx, &Action::List.method())?;
    let store = state.store.0.lock();
    let list = store.list_reviews();
    Ok(Json(Render::new(&store, &state.config).reviews(&list)))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ReviewView>)> {
    check_collection(COLLECTION_POLICY, &ctx, &Action::Create.method())?;
    let user = ctx.require_user()?;
    let changes = body(payload)?.validate_create()?;
    let mut store = state.store.0.lock();
    let review = store.create_review(user.id, changes)?;
    let title = store.get_series(review.series_id)?.title;
    store.record_activity(user.id, ActivityKind::Review, &format!("Reviewed \"{title}\" ({}/5)", review.rating))?;
    info!(target: "serieshub::reviews", "created review id={} series={} by user={} request={}", review.id, review.series_id, user.id, ctx.request_id);
    Ok((StatusCode::CREATED, Json(Render::new(&store, &state.config).review(&review))))
}

pub async fn retrieve(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<ReviewView>> {
    let method = Action::Retrieve.method();
    check_collection(COLLECTION_POLICY, &ctx, &method)?;
    let store = state.store.0.lock();
    let review = store.get_review(path_id(&id, "review")?)?;
    check_object_strict(OBJECT_POLICY, &ctx, &method, &review, "review")?;
    Ok(Json(Render::new(&store, &state.config).review(&review)))
}

async fn update(state: AppState, ctx: RequestContext, id: String, action: Action, payload: Result<Json<ReviewInput>, JsonRejection>) -> AppResult<Json<ReviewView>> {
    let method = action.method();
    check_collection(COLLECTION_POLICY, &ctx, &method)?;
    let mut store = state.store.0.lock();
    let review = store.get_review(path_id(&id, "review")?)?;
    check_object_strict(OBJECT_POLICY, &ctx, &method, &review, "review")?;
    let changes = body(payload)?.validate_update(&review, action == Action::PartialUpdate)?;
    let review = store.update_review(review.id, changes)?;
    info!(target: "serieshub::reviews", "updated review id={} request={}", review.id, ctx.request_id);
    Ok(Json(Render::new(&store, &state.config).review(&review)))
}

pub async fn put(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> AppResult<Json<ReviewView>> {
    update(state, ctx, id, Action::Update, payload).await
}

pub async fn patch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> AppResult<Json<ReviewView>> {
    update(state, ctx, id, Action::PartialUpdate, payload).await
}

pub async fn destroy(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<StatusCode> {
    let method = Action::Destroy.method();
    check_collection(COLLECTION_POLICY, &ctx, &method)?;
    let mut store = state.store.0.lock();
    let review = store.get_review(path_id(&id, "review")?)?;
    check_object_strict(OBJECT_POLICY, &ctx, &method, &review, "review")?;
    store.delete_review(review.id)?;
    info!(target: "serieshub::reviews", "deleted review id={} by identity={:?} request={}", review.id, ctx.identity, ctx.request_id);
    Ok(StatusCode::NO_CONTENT)
}
