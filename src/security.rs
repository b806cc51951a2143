//! Password hashing and credential checks (argon2, PHC strings).

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use tracing::{info, warn};

use crate::catalog::{NewUser, User};
use crate::storage::SharedStore;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Look up an active user by name and check the password. Unknown users and
/// wrong passwords are indistinguishable to the caller.
pub fn authenticate(store: &SharedStore, username: &str, password: &str) -> Option<User> {
    let user = store.0.lock().user_by_username(username)?;
    if !user.is_active { return None; }
    if verify_password(&user.password_hash, password) { Some(user) } else { None }
}

/// Make sure the configured bootstrap admin exists. An existing account with the
/// same name is promoted instead of being recreated.
pub fn ensure_admin(store: &SharedStore, username: &str, password: &str) -> Result<User> {
    let existing = store.0.lock().user_by_username(username);
    if let Some(user) = existing {
        if user.is_admin { return Ok(user); }
        warn!(target: "serieshub::security", "promoting existing user '{}' to admin", username);
        return store.0.lock().set_admin(user.id, true).map_err(|e| anyhow!(e));
    }
    let hash = hash_password(password)?;
    let new = NewUser {
        username: username.to_string(),
        email: format!("{}@localhost", username.to_ascii_lowercase()),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: hash,
        is_admin: true,
    };
    let user = store.0.lock().create_user(new).map_err(|e| anyhow!(e))?;
    info!(target: "serieshub::security", "created bootstrap admin '{}' id={}", user.username, user.id);
    Ok(user)
}
