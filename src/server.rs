//!
//! serieshub HTTP server
//! ---------------------
//! This module defines the Axum-based REST API and the small HTML page set.
//!
//! Responsibilities:
//! - Bearer-token authentication (token pair issue, refresh, verify, logout).
//! - Account registration, user and profile management.
//! - Series and review CRUD guarded by the two-phase access policy.
//! - Startup: store opening, bootstrap admin, configuration logging.

use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::ServerConfig;
use crate::identity::{LocalAuthProvider, SessionManager};
use crate::security;
use crate::storage::SharedStore;

pub mod auth;
pub mod dispatch;
pub mod extract;
pub mod pages;
pub mod profile;
pub mod reviews;
pub mod series;
pub mod users;
pub mod views;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub sessions: SessionManager,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: SharedStore, config: ServerConfig) -> Self {
        let sessions = SessionManager::new(config.access_ttl, config.refresh_ttl);
        Self { store, sessions, config: Arc::new(config) }
    }

    pub fn auth(&self) -> LocalAuthProvider {
        LocalAuthProvider::new(self.store.clone(), self.sessions.clone())
    }
}

fn log_startup(config: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "serieshub starting: RUST_LOG='{}', addr={}, data_dir={:?}, cwd={:?}, access_ttl={}s, refresh_ttl={}s, media_url='{}', admin={:?}",
        rust_log,
        config.addr(),
        config.data_dir,
        cwd,
        config.access_ttl.as_secs(),
        config.refresh_ttl.as_secs(),
        config.media_url,
        config.admin.as_ref().map(|(u, _)| u)
    );
}

/// Open the store and make sure the configured admin account exists.
pub fn build_state(config: ServerConfig) -> anyhow::Result<AppState> {
    let store = match &config.data_dir {
        Some(dir) => SharedStore::open(dir).with_context(|| format!("While opening catalog under {}", dir.display()))?,
        None => SharedStore::in_memory(),
    };
    if let Some((user, password)) = &config.admin {
        security::ensure_admin(&store, user, password).with_context(|| format!("While ensuring admin account '{}'", user))?;
    }
    Ok(AppState::new(store, config))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/series/", get(pages::series_list))
        .route("/series/{id}/", get(pages::series_detail))
        .route("/health", get(pages::health))
        // tokens
        .route("/api/token/", post(auth::obtain_pair))
        .route("/api/token/refresh/", post(auth::refresh))
        .route("/api/token/verify/", post(auth::verify))
        .route("/api/v1/auth/register/", post(auth::register))
        .route("/api/v1/auth/login/", post(auth::login))
        .route("/api/v1/auth/logout/", post(auth::logout))
        // series
        .route("/api/v1/genres/", get(series::genres))
        .route("/api/v1/series/", get(series::list).post(series::create))
        .route("/api/v1/series/mine/", get(series::mine))
        .route("/api/v1/series/stats/", get(series::stats))
        .route(
            "/api/v1/series/{id}/",
            get(series::retrieve).put(series::put).patch(series::patch).delete(series::destroy),
        )
        .route("/api/v1/series/{id}/related/", get(series::related))
        .route("/api/v1/series/{id}/reviews/", get(series::reviews))
        // reviews
        .route("/api/v1/reviews/", get(reviews::list).post(reviews::create))
        .route(
            "/api/v1/reviews/{id}/",
            get(reviews::retrieve).put(reviews::put).patch(reviews::patch).delete(reviews::destroy),
        )
        // users
        .route("/api/v1/users/", get(users::list))
        .route("/api/v1/users/me/", get(users::me).delete(users::delete_me))
        .route("/api/v1/users/change_password/", post(users::change_password))
        .route(
            "/api/v1/users/{id}/",
            get(users::retrieve).put(users::put).patch(users::patch).delete(users::destroy),
        )
        .route("/api/v1/users/{id}/activities/", get(users::activities))
        // profiles
        .route("/api/v1/profile/", get(profile::show_own).post(profile::update_own))
        .route("/api/v1/profile/avatar/", post(profile::set_avatar).delete(profile::clear_avatar))
        .route("/api/v1/profiles/{id}/", get(profile::retrieve).patch(profile::patch))
        .with_state(state)
}

pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    log_startup(&config);
    let addr = config.addr();
    let state = build_state(config)?;
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("While binding {}", addr))?;
    info!("Starting server on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
