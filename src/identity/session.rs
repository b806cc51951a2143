use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use serde::Serialize;

use super::principal::Principal;
use crate::error::{AppError, AppResult};
use crate::policy::UserId;
use crate::tprintln;

pub type SessionToken = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind { Access, Refresh }

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub kind: TokenKind,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: SessionToken,
    pub refresh: SessionToken,
}

#[derive(Debug, Default)]
struct Sessions {
    by_token: HashMap<SessionToken, Session>,
    by_user: HashMap<UserId, HashSet<SessionToken>>,
}

impl Sessions {
    fn insert(&mut self, s: Session) {
        self.by_user.entry(s.principal.user_id).or_default().insert(s.token.clone());
        self.by_token.insert(s.token.clone(), s);
    }

    fn remove(&mut self, token: &str) -> Option<Session> {
        let s = self.by_token.remove(token)?;
        if let Some(set) = self.by_user.get_mut(&s.principal.user_id) {
            set.remove(token);
            if set.is_empty() { self.by_user.remove(&s.principal.user_id); }
        }
        Some(s)
    }

    /// Drop every entry that expired at or before `now`.
    fn prune(&mut self, now: Instant) -> usize {
        let expired: Vec<SessionToken> =
            self.by_token.values().filter(|s| s.expires_at <= now).map(|s| s.token.clone()).collect();
        for t in &expired {
            self.remove(t);
        }
        expired.len()
    }
}

fn gen_id() -> AppResult<String> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AppError::internal("token_rng".to_string(), e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Issues and validates opaque bearer tokens. Cloning shares the same token table.
#[derive(Clone)]
pub struct SessionManager {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    sessions: Arc<RwLock<Sessions>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60), Duration::from_secs(24 * 60 * 60)) }
}

impl SessionManager {
    pub fn new(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self { access_ttl, refresh_ttl, sessions: Arc::new(RwLock::new(Sessions::default())) }
    }

    fn mint(&self, session_id: &str, kind: TokenKind, principal: &Principal, now: Instant) -> AppResult<Session> {
        let ttl = match kind { TokenKind::Access => self.access_ttl, TokenKind::Refresh => self.refresh_ttl };
        Ok(Session {
            session_id: session_id.to_string(),
            token: gen_id()?,
            kind,
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + ttl,
        })
    }

    /// Issue an access/refresh pair. Expired entries are pruned while the table is locked.
    pub fn issue(&self, principal: Principal) -> AppResult<TokenPair> {
        let now = Instant::now();
        let sid = gen_id()?;
        let access = self.mint(&sid, TokenKind::Access, &principal, now)?;
        let refresh = self.mint(&sid, TokenKind::Refresh, &principal, now)?;
        let pair = TokenPair { access: access.token.clone(), refresh: refresh.token.clone() };
        let pruned = {
            let mut m = self.sessions.write();
            let pruned = m.prune(now);
            m.insert(access);
            m.insert(refresh);
            pruned
        };
        tprintln!("session.issue user={} sid={} ttl_secs={} pruned={}", principal.user_id, sid, self.access_ttl.as_secs(), pruned);
        Ok(pair)
    }

    /// Live session for a token of the given kind; expired entries are dropped on sight.
    fn live(&self, token: &str, kind: TokenKind) -> Option<Session> {
        let now = Instant::now();
        let mut expired = false;
        let out = {
            let map = self.sessions.read();
            match map.by_token.get(token) {
                Some(s) if s.expires_at > now => (s.kind == kind).then(|| s.clone()),
                Some(_) => { expired = true; None }
                None => None,
            }
        };
        if expired {
            self.sessions.write().remove(token);
        }
        out
    }

    pub fn validate(&self, token: &str) -> Option<Principal> {
        self.live(token, TokenKind::Access).map(|s| s.principal)
    }

    /// Exchange a refresh token for a fresh access token. The refresh token keeps
    /// working until it expires or is revoked.
    /// `Ok(None)` when the refresh token is unknown, expired or revoked.
    pub fn refresh(&self, refresh_token: &str) -> AppResult<Option<SessionToken>> {
        let Some(s) = self.live(refresh_token, TokenKind::Refresh) else { return Ok(None); };
        let now = Instant::now();
        let access = self.mint(&s.session_id, TokenKind::Access, &s.principal, now)?;
        let token = access.token.clone();
        let mut m = self.sessions.write();
        m.prune(now);
        m.insert(access);
        Ok(Some(token))
    }

    /// True for any live access or refresh token.
    pub fn verify(&self, token: &str) -> bool {
        self.live(token, TokenKind::Access).is_some() || self.live(token, TokenKind::Refresh).is_some()
    }

    /// Revoke every token that belongs to the same session as `token`.
    pub fn logout(&self, token: &str) -> bool {
        let mut m = self.sessions.write();
        let Some(s) = m.remove(token) else { return false; };
        let siblings: Vec<SessionToken> = m
            .by_user
            .get(&s.principal.user_id)
            .map(|set| set.iter().filter(|t| m.by_token.get(*t).is_some_and(|o| o.session_id == s.session_id)).cloned().collect())
            .unwrap_or_default();
        for t in siblings {
            m.remove(&t);
        }
        true
    }

    pub fn revoke_user(&self, user_id: UserId) -> usize {
        let mut m = self.sessions.write();
        let tokens: Vec<SessionToken> = m.by_user.get(&user_id).map(|s| s.iter().cloned().collect()).unwrap_or_default();
        let mut count = 0usize;
        for t in &tokens {
            if m.remove(t).is_some() { count += 1; }
        }
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }
}
