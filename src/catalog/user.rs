use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::genre::Genre;
use crate::policy::{OwnerRef, UserId};

/// A registered account. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password_hash: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

fn default_true() -> bool { true }

impl User {
    /// "first last" when both are set, otherwise the username.
    pub fn full_name(&self) -> String {
        if !self.first_name.is_empty() && !self.last_name.is_empty() {
            format!("{} {}", self.first_name, self.last_name)
        } else {
            self.username.clone()
        }
    }
}

/// An account owns itself.
impl OwnerRef for User {
    fn user(&self) -> Option<UserId> { Some(self.id) }
}

/// Fields accepted when creating a user; already validated.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub website: String,
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    #[serde(default)]
    pub favorite_genres: Vec<Genre>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            bio: String::new(),
            avatar: None,
            birth_date: None,
            website: String::new(),
            email_notifications: true,
            favorite_genres: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl OwnerRef for UserProfile {
    fn user(&self) -> Option<UserId> { Some(self.user_id) }
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub bio: Option<String>,
    pub avatar: Option<Option<String>>,
    pub birth_date: Option<Option<NaiveDate>>,
    pub website: Option<String>,
    pub email_notifications: Option<bool>,
    pub favorite_genres: Option<Vec<Genre>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind { Review, Watched, Wishlist }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserActivity {
    pub id: u64,
    pub user_id: UserId,
    pub kind: ActivityKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl OwnerRef for UserActivity {
    fn user(&self) -> Option<UserId> { Some(self.user_id) }
}
