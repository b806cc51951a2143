//! Series endpoints. Anyone may read; writes need an account, and an existing
//! series may only be changed by its creator (admins included).

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::info;

use super::dispatch::{check_collection, check_object_strict};
use super::extract::{body, path_id};
use super::views::{GenreView, Render, ReviewView, SeriesListItem, SeriesView};
use super::AppState;
use crate::catalog::{Genre, SeriesInput};
use crate::error::AppResult;
use crate::identity::RequestContext;
use crate::policy::{AccessPolicy, Action};
use crate::storage::{SeriesStats, RELATED_LIMIT};

pub const COLLECTION_POLICY: AccessPolicy = AccessPolicy::ReadOnlyForEveryoneElseWrite;
pub const OBJECT_POLICY: AccessPolicy = AccessPolicy::OwnerWriteOnly;

pub async fn list(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<SeriesListItem>>> {
    check_collection(COLLECTION_POLICY, &ctx, &Action::List.method())?;
    let store = state.store.0.lock();
    let list = store.list_series();
    Ok(Json(Render::new(&store, &state.config).series_list(&list)))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<SeriesInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<SeriesView>)> {
    check_collection(COLLECTION_POLICY, &ctx, &Action::Create.method())?;
    let user = ctx.require_user()?;
    let changes = body(payload)?.validate(false)?;
    let mut store = state.store.0.lock();
    let series = store.create_series(user.id, changes)?;
    info!(target: "serieshub::series", "created series id={} by user={} request={}", series.id, user.id, ctx.request_id);
    Ok((StatusCode::CREATED, Json(Render::new(&store, &state.config).series(&series))))
}

pub async fn retrieve(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<SeriesView>> {
    let method = Action::Retrieve.method();
    check_collection(COLLECTION_POLICY, &ctx, &method)?;
    let store = state.store.0.lock();
    let series = store.get_series(path_id(&id, "series")?)?;
    check_object_strict(OBJECT_POLICY, &ctx, &method, &series, "series")?;
    Ok(Json(Render::new(&store, &state.config).series(&series)))
}

async fn update(state: AppState, ctx: RequestContext, id: String, action: Action, payload: Result<Json<SeriesInput>, JsonRejection>) -> AppResult<Json<SeriesView>> {
    let method = action.method();
    check_collection(COLLECTION_POLICY, &ctx, &method)?;
    let mut store = state.store.0.lock();
    let series = store.get_series(path_id(&id, "series")?)?;
    check_object_strict(OBJECT_POLICY, &ctx, &method, &series, "series")?;
    let changes = body(payload)?.validate(action == Action::PartialUpdate)?;
    let series = store.update_series(series.id, changes)?;
    info!(target: "serieshub::series", "updated series id={} request={}", series.id, ctx.request_id);
    Ok(Json(Render::new(&store, &state.config).series(&series)))
}

pub async fn put(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<SeriesInput>, JsonRejection>,
) -> AppResult<Json<SeriesView>> {
    update(state, ctx, id, Action::Update, payload).await
}

pub async fn patch(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<SeriesInput>, JsonRejection>,
) -> AppResult<Json<SeriesView>> {
    update(state, ctx, id, Action::PartialUpdate, payload).await
}

pub async fn destroy(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<StatusCode> {
    let method = Action::Destroy.method();
    check_collection(COLLECTION_POLICY, &ctx, &method)?;
    let mut store = state.store.0.lock();
    let series = store.get_series(path_id(&id, "series")?)?;
    check_object_strict(OBJECT_POLICY, &ctx, &method, &series, "series")?;
    store.delete_series(series.id)?;
    info!(target: "serieshub::series", "deleted series id={} request={}", series.id, ctx.request_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Series created by the caller.
pub async fn mine(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<SeriesListItem>>> {
    let user = ctx.require_user()?;
    let store = state.store.0.lock();
    let list = store.series_by(user.id);
    Ok(Json(Render::new(&store, &state.config).series_list(&list)))
}

pub async fn stats(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<SeriesStats>> {
    check_collection(COLLECTION_POLICY, &ctx, &Action::List.method())?;
    Ok(Json(state.store.0.lock().stats(Utc::now())))
}

pub async fn related(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<Vec<SeriesListItem>>> {
    check_collection(COLLECTION_POLICY, &ctx, &Action::Retrieve.method())?;
    let store = state.store.0.lock();
    let list = store.related_series(path_id(&id, "series")?, RELATED_LIMIT)?;
    Ok(Json(Render::new(&store, &state.config).series_list(&list)))
}

pub async fn reviews(State(state): State<AppState>, ctx: RequestContext, Path(id): Path<String>) -> AppResult<Json<Vec<ReviewView>>> {
    check_collection(COLLECTION_POLICY, &ctx, &Action::Retrieve.method())?;
    let store = state.store.0.lock();
    let series = store.get_series(path_id(&id, "series")?)?;
    let list = store.reviews_for_series(series.id);
    Ok(Json(Render::new(&store, &state.config).reviews(&list)))
}

pub async fn genres() -> Json<Vec<GenreView>> {
    Json(Genre::ALL.iter().copied().map(GenreView::from).collect())
}
