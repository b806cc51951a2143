use axum::http::HeaderMap;

use super::principal::identity_for;
use super::session::{SessionManager, SessionToken};
use crate::catalog::User;
use crate::error::{AppError, AppResult};
use crate::policy::Identity;
use crate::storage::SharedStore;

/// Per-request caller information, built fresh from the bearer token and the
/// current stored user record.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub user: Option<User>,
    pub token: Option<SessionToken>,
    pub request_id: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self { identity: Identity::Anonymous, user: None, token: None, request_id: uuid::Uuid::new_v4().to_string() }
    }
}

/// The token of an `Authorization: Bearer <token>` header. Other schemes are ignored.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

impl RequestContext {
    /// No bearer token means anonymous. A token that is unknown, expired, or
    /// belongs to a deleted or inactive account is rejected outright.
    pub fn resolve(store: &SharedStore, sessions: &SessionManager, headers: &HeaderMap) -> AppResult<Self> {
        let mut ctx = RequestContext::default();
        let Some(token) = bearer_token(headers) else { return Ok(ctx); };
        let invalid = || AppError::auth("token_not_valid", "given token not valid for any token type");
        let principal = sessions.validate(&token).ok_or_else(invalid)?;
        let user = store.0.lock().get_user(principal.user_id).map_err(|_| invalid())?;
        if !user.is_active {
            return Err(AppError::auth("user_inactive", "user is inactive"));
        }
        ctx.identity = identity_for(&user);
        ctx.user = Some(user);
        ctx.token = Some(token);
        Ok(ctx)
    }

    pub fn is_authenticated(&self) -> bool { self.identity.is_authenticated() }

    /// The calling user, or 401 for anonymous callers.
    pub fn require_user(&self) -> AppResult<&User> {
        self.user.as_ref().ok_or_else(AppError::not_authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Principal;
    use axum::http::HeaderValue;

    fn headers(v: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        h
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc".into()));
        assert_eq!(bearer_token(&headers("bearer   abc ")), Some("abc".into()));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn resolve_paths() {
        let store = SharedStore::in_memory();
        let sm = SessionManager::default();
        let admin = crate::security::ensure_admin(&store, "root", "rootroot").unwrap();

        let anon = RequestContext::resolve(&store, &sm, &HeaderMap::new()).unwrap();
        assert_eq!(anon.identity, Identity::Anonymous);
        assert!(anon.require_user().is_err());

        let err = RequestContext::resolve(&store, &sm, &headers("Bearer nope")).unwrap_err();
        assert_eq!(err.http_status(), 401);

        let pair = sm.issue(Principal::for_user(&admin)).unwrap();
        let ctx = RequestContext::resolve(&store, &sm, &headers(&format!("Bearer {}", pair.access))).unwrap();
        assert_eq!(ctx.identity, Identity::admin(admin.id));

        store.0.lock().delete_user(admin.id).unwrap();
        let gone = RequestContext::resolve(&store, &sm, &headers(&format!("Bearer {}", pair.access))).unwrap_err();
        assert_eq!(gone.http_status(), 401);
    }
}
