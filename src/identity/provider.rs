use tracing::info;

use super::principal::Principal;
use super::session::{SessionManager, TokenPair};
use crate::catalog::User;
use crate::error::{AppError, AppResult};
use crate::security;
use crate::storage::SharedStore;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub tokens: TokenPair,
    pub user: User,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
}

/// Password login against the catalog's own user table.
#[derive(Clone)]
pub struct LocalAuthProvider {
    pub store: SharedStore,
    pub sm: SessionManager,
}

impl LocalAuthProvider {
    pub fn new(store: SharedStore, sm: SessionManager) -> Self { Self { store, sm } }

    /// Issue tokens for an already verified user and stamp the login time.
    pub fn start_session(&self, user: &User) -> AppResult<TokenPair> {
        self.store.0.lock().touch_login(user.id)?;
        self.sm.issue(Principal::for_user(user))
    }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let Some(user) = security::authenticate(&self.store, &req.username, &req.password) else {
            info!(target: "serieshub::auth", "login rejected user={} ip={:?}", req.username, req.ip);
            return Err(AppError::auth("invalid_credentials", "no active account found with the given credentials"));
        };
        let tokens = self.start_session(&user)?;
        info!(target: "serieshub::auth", "login user={} id={} ip={:?}", user.username, user.id, req.ip);
        let user = self.store.0.lock().get_user(user.id)?;
        Ok(LoginResponse { tokens, user })
    }
}
