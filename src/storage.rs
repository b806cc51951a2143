//!
//! serieshub storage module
//! -------------------------
//! In-memory catalog tables (users, profiles, series, reviews, activities) with an
//! optional JSON snapshot on disk. When the store is opened on a data directory,
//! every mutation rewrites `<data_dir>/catalog.json` through a temp file and a
//! rename, and the snapshot is loaded back at startup.
//!
//! Key responsibilities:
//! - Id assignment and uniqueness of usernames and emails (case-insensitive).
//! - Cascading deletes: a user takes their series, reviews, profile and activity
//!   history with them; a series takes its reviews.
//! - Read models used by the API: related series, statistics, review summaries.
//!
//! The public API centers around `Store`, shared between handlers as
//! `SharedStore` (`Arc<Mutex<Store>>`). The lock is held for a single call and
//! never across an await point.
//!
//! Mutations work on a copy of the tables that replaces the live tables only
//! after the snapshot write and rename succeed, so a failed write changes
//! nothing. The write is synchronous and runs under the lock on the calling
//! worker; the snapshot is a single small file per catalog.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::catalog::validate;
use crate::catalog::{
    ActivityKind, Genre, NewUser, ProfilePatch, Review, ReviewChanges, ReviewId, Series, SeriesChanges, SeriesId,
    User, UserActivity, UserPatch, UserProfile,
};
use crate::error::{AppError, AppResult};
use crate::policy::UserId;

pub const SNAPSHOT_FILE: &str = "catalog.json";
pub const RELATED_LIMIT: usize = 4;
pub const ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    next_user_id: u64,
    #[serde(default)]
    next_series_id: u64,
    #[serde(default)]
    next_review_id: u64,
    #[serde(default)]
    next_activity_id: u64,
    #[serde(default)]
    users: BTreeMap<UserId, User>,
    #[serde(default)]
    profiles: BTreeMap<UserId, UserProfile>,
    #[serde(default)]
    series: BTreeMap<SeriesId, Series>,
    #[serde(default)]
    reviews: BTreeMap<ReviewId, Review>,
    #[serde(default)]
    activities: Vec<UserActivity>,
}

fn bump(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

fn user_mut(tables: &mut Tables, id: UserId) -> AppResult<&mut User> {
    tables.users.get_mut(&id).ok_or_else(|| AppError::not_found("user_not_found", "user not found"))
}

/// Aggregate counts for the statistics endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeriesStats {
    pub total_series: usize,
    /// Only genres with at least one series appear.
    pub series_by_genre: BTreeMap<String, usize>,
    /// Series created during the last seven days.
    pub recent_series: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ReviewSummary {
    pub review_count: usize,
    pub average_rating: Option<f64>,
}

pub struct Store {
    /// Snapshot file; `None` keeps everything in memory.
    path: Option<PathBuf>,
    tables: Tables,
}

impl Store {
    pub fn in_memory() -> Self {
        Self { path: None, tables: Tables::default() }
    }

    /// Open (or create) a store persisted under `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        let path = dir.join(SNAPSHOT_FILE);
        let tables = if path.exists() {
            let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<Tables>(&text).with_context(|| format!("Corrupt catalog snapshot: {}", path.display()))?
        } else {
            Tables::default()
        };
        debug!(
            target: "serieshub::storage",
            "open: path='{}' users={} series={} reviews={}",
            path.display(), tables.users.len(), tables.series.len(), tables.reviews.len()
        );
        Ok(Self { path: Some(path), tables })
    }

    fn write_snapshot(path: &Path, tables: &Tables) -> AppResult<()> {
        let text = serde_json::to_string_pretty(tables)
            .map_err(|e| AppError::internal("snapshot_encode".to_string(), e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        let res = fs::write(&tmp, text).and_then(|_| fs::rename(&tmp, path));
        if let Err(e) = res {
            error!(target: "serieshub::storage", "persist failed path='{}': {}", path.display(), e);
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Apply `f` to a copy of the tables and keep the copy only once the
    /// snapshot holding it is on disk. A failed write leaves the store as it was.
    fn commit<T>(&mut self, f: impl FnOnce(&mut Tables) -> AppResult<T>) -> AppResult<T> {
        let Some(path) = &self.path else { return f(&mut self.tables); };
        let mut next = self.tables.clone();
        let out = f(&mut next)?;
        Self::write_snapshot(path, &next)?;
        self.tables = next;
        Ok(out)
    }

    // ---- users ----

    fn username_taken(&self, username: &str, except: Option<UserId>) -> bool {
        self.tables.users.values().any(|u| Some(u.id) != except && u.username.eq_ignore_ascii_case(username))
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.tables.users.values().any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    /// Insert a user together with an empty profile.
    pub fn create_user(&mut self, new: NewUser) -> AppResult<User> {
        if self.username_taken(&new.username, None) {
            return Err(AppError::field("username", "this username is already in use"));
        }
        if self.email_taken(&new.email, None) {
            return Err(AppError::field("email", "this email is already in use"));
        }
        self.commit(|t| {
            let id = bump(&mut t.next_user_id);
            let user = User {
                id,
                username: new.username,
                email: new.email,
                first_name: new.first_name,
                last_name: new.last_name,
                password_hash: new.password_hash,
                is_admin: new.is_admin,
                is_active: true,
                date_joined: Utc::now(),
                last_login: None,
            };
            t.users.insert(id, user.clone());
            t.profiles.insert(id, UserProfile::new(id));
            Ok(user)
        })
    }

    pub fn get_user(&self, id: UserId) -> AppResult<User> {
        self.tables.users.get(&id).cloned().ok_or_else(|| AppError::not_found("user_not_found", "user not found"))
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        self.tables.users.values().find(|u| u.username.eq_ignore_ascii_case(username)).cloned()
    }

    pub fn list_users(&self) -> Vec<User> { self.tables.users.values().cloned().collect() }

    pub fn update_user(&mut self, id: UserId, patch: UserPatch) -> AppResult<User> {
        if let Some(email) = &patch.email {
            if self.email_taken(email, Some(id)) {
                return Err(AppError::field("email", "this email is already in use"));
            }
        }
        self.commit(|t| {
            let user = user_mut(t, id)?;
            if let Some(e) = patch.email { user.email = e; }
            if let Some(f) = patch.first_name { user.first_name = f; }
            if let Some(l) = patch.last_name { user.last_name = l; }
            Ok(user.clone())
        })
    }

    pub fn set_password_hash(&mut self, id: UserId, hash: String) -> AppResult<()> {
        self.commit(|t| {
            user_mut(t, id)?.password_hash = hash;
            Ok(())
        })
    }

    pub fn set_admin(&mut self, id: UserId, is_admin: bool) -> AppResult<User> {
        self.commit(|t| {
            let user = user_mut(t, id)?;
            user.is_admin = is_admin;
            Ok(user.clone())
        })
    }

    pub fn touch_login(&mut self, id: UserId) -> AppResult<()> {
        self.commit(|t| {
            user_mut(t, id)?.last_login = Some(Utc::now());
            Ok(())
        })
    }

    /// Delete a user and everything they own.
    pub fn delete_user(&mut self, id: UserId) -> AppResult<()> {
        self.commit(|t| {
            if t.users.remove(&id).is_none() {
                return Err(AppError::not_found("user_not_found", "user not found"));
            }
            let owned: Vec<SeriesId> = t.series.values().filter(|s| s.created_by == id).map(|s| s.id).collect();
            for sid in &owned {
                t.series.remove(sid);
            }
            t.reviews.retain(|_, r| r.user_id != id && !owned.contains(&r.series_id));
            t.profiles.remove(&id);
            t.activities.retain(|a| a.user_id != id);
            debug!(target: "serieshub::storage", "delete_user: id={} cascaded_series={}", id, owned.len());
            Ok(())
        })
    }

    pub fn series_count(&self, user_id: UserId) -> usize {
        self.tables.series.values().filter(|s| s.created_by == user_id).count()
    }

    // ---- profiles ----

    /// The user's profile, created on first access.
    pub fn profile(&mut self, user_id: UserId) -> AppResult<UserProfile> {
        if !self.tables.users.contains_key(&user_id) {
            return Err(AppError::not_found("user_not_found", "user not found"));
        }
        if let Some(p) = self.tables.profiles.get(&user_id) {
            return Ok(p.clone());
        }
        self.commit(|t| Ok(t.profiles.entry(user_id).or_insert_with(|| UserProfile::new(user_id)).clone()))
    }

    pub fn update_profile(&mut self, user_id: UserId, patch: ProfilePatch) -> AppResult<UserProfile> {
        if !self.tables.users.contains_key(&user_id) {
            return Err(AppError::not_found("user_not_found", "user not found"));
        }
        self.commit(|t| {
            let p = t.profiles.entry(user_id).or_insert_with(|| UserProfile::new(user_id));
            if let Some(b) = patch.bio { p.bio = b; }
            if let Some(a) = patch.avatar { p.avatar = a; }
            if let Some(d) = patch.birth_date { p.birth_date = d; }
            if let Some(w) = patch.website { p.website = w; }
            if let Some(n) = patch.email_notifications { p.email_notifications = n; }
            if let Some(g) = patch.favorite_genres { p.favorite_genres = g; }
            Ok(p.clone())
        })
    }

    // ---- series ----

    /// Create a series from validated changes. Title, description and year must
    /// be present; the genre defaults to `Other`.
    pub fn create_series(&mut self, created_by: UserId, changes: SeriesChanges) -> AppResult<Series> {
        if !self.tables.users.contains_key(&created_by) {
            return Err(AppError::not_found("user_not_found", "user not found"));
        }
        let mut v = validate::Validator::new();
        let title = v.check("title", validate::required(changes.title));
        let description = v.check("description", validate::required(changes.description));
        let year = v.check("year", validate::required(changes.year));
        v.finish()?;
        let (Some(title), Some(description), Some(year)) = (title, description, year) else {
            return Err(AppError::internal("validator_state", "validator passed with missing fields"));
        };
        let now = Utc::now();
        self.commit(|t| {
            let id = bump(&mut t.next_series_id);
            let series = Series {
                id,
                title,
                description,
                year,
                genre: changes.genre.unwrap_or(Genre::Other),
                image: changes.image.flatten(),
                created_by,
                created_at: now,
                updated_at: now,
            };
            t.series.insert(id, series.clone());
            Ok(series)
        })
    }

    pub fn get_series(&self, id: SeriesId) -> AppResult<Series> {
        self.tables.series.get(&id).cloned().ok_or_else(|| AppError::not_found("series_not_found", "series not found"))
    }

    /// All series, newest first.
    pub fn list_series(&self) -> Vec<Series> { self.tables.series.values().rev().cloned().collect() }

    pub fn series_by(&self, user_id: UserId) -> Vec<Series> {
        self.tables.series.values().rev().filter(|s| s.created_by == user_id).cloned().collect()
    }

    pub fn update_series(&mut self, id: SeriesId, changes: SeriesChanges) -> AppResult<Series> {
        self.commit(|t| {
            let s = t.series.get_mut(&id).ok_or_else(|| AppError::not_found("series_not_found", "series not found"))?;
            s.apply(changes, Utc::now());
            Ok(s.clone())
        })
    }

    pub fn delete_series(&mut self, id: SeriesId) -> AppResult<()> {
        self.commit(|t| {
            if t.series.remove(&id).is_none() {
                return Err(AppError::not_found("series_not_found", "series not found"));
            }
            t.reviews.retain(|_, r| r.series_id != id);
            Ok(())
        })
    }

    /// Other series of the same genre, newest first.
    pub fn related_series(&self, id: SeriesId, limit: usize) -> AppResult<Vec<Series>> {
        let base = self.get_series(id)?;
        Ok(self
            .tables
            .series
            .values()
            .rev()
            .filter(|s| s.genre == base.genre && s.id != base.id)
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SeriesStats {
        let mut by_genre: BTreeMap<String, usize> = BTreeMap::new();
        for s in self.tables.series.values() {
            *by_genre.entry(s.genre.key().to_string()).or_insert(0) += 1;
        }
        let since = now - Duration::days(7);
        SeriesStats {
            total_series: self.tables.series.len(),
            series_by_genre: by_genre,
            recent_series: self.tables.series.values().filter(|s| s.created_at >= since).count(),
        }
    }

    pub fn review_summary(&self, series_id: SeriesId) -> ReviewSummary {
        let ratings: Vec<u8> = self.tables.reviews.values().filter(|r| r.series_id == series_id).map(|r| r.rating).collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64)
        };
        ReviewSummary { review_count: ratings.len(), average_rating }
    }

    // ---- reviews ----

    pub fn create_review(&mut self, user_id: UserId, changes: ReviewChanges) -> AppResult<Review> {
        let mut v = validate::Validator::new();
        let series_id = v.check("series", validate::required(changes.series));
        let text = v.check("text", validate::required(changes.text));
        let rating = v.check("rating", validate::required(changes.rating));
        if let Some(sid) = series_id {
            if !self.tables.series.contains_key(&sid) {
                v.fail("series", format!("series {sid} does not exist"));
            }
        }
        v.finish()?;
        let (Some(series_id), Some(text), Some(rating)) = (series_id, text, rating) else {
            return Err(AppError::internal("validator_state", "validator passed with missing fields"));
        };
        let now = Utc::now();
        self.commit(|t| {
            let id = bump(&mut t.next_review_id);
            let review = Review { id, series_id, user_id, text, rating, created_at: now, updated_at: now };
            t.reviews.insert(id, review.clone());
            Ok(review)
        })
    }

    pub fn get_review(&self, id: ReviewId) -> AppResult<Review> {
        self.tables.reviews.get(&id).cloned().ok_or_else(|| AppError::not_found("review_not_found", "review not found"))
    }

    pub fn reviews_for_series(&self, series_id: SeriesId) -> Vec<Review> {
        self.tables.reviews.values().rev().filter(|r| r.series_id == series_id).cloned().collect()
    }

    pub fn list_reviews(&self) -> Vec<Review> { self.tables.reviews.values().rev().cloned().collect() }

    pub fn review_count_by(&self, user_id: UserId) -> usize {
        self.tables.reviews.values().filter(|r| r.user_id == user_id).count()
    }

    pub fn update_review(&mut self, id: ReviewId, changes: ReviewChanges) -> AppResult<Review> {
        self.commit(|t| {
            let r = t.reviews.get_mut(&id).ok_or_else(|| AppError::not_found("review_not_found", "review not found"))?;
            r.apply(changes, Utc::now());
            Ok(r.clone())
        })
    }

    pub fn delete_review(&mut self, id: ReviewId) -> AppResult<()> {
        self.commit(|t| match t.reviews.remove(&id) {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("review_not_found", "review not found")),
        })
    }

    // ---- activity ----

    pub fn record_activity(&mut self, user_id: UserId, kind: ActivityKind, description: &str) -> AppResult<UserActivity> {
        if !self.tables.users.contains_key(&user_id) {
            return Err(AppError::not_found("user_not_found", "user not found"));
        }
        let description = validate::activity_description(description);
        self.commit(|t| {
            let activity = UserActivity {
                id: bump(&mut t.next_activity_id),
                user_id,
                kind,
                description,
                created_at: Utc::now(),
            };
            t.activities.push(activity.clone());
            Ok(activity)
        })
    }

    /// Most recent activities of a user, newest first.
    pub fn activities_for(&self, user_id: UserId, limit: usize) -> Vec<UserActivity> {
        self.tables.activities.iter().rev().filter(|a| a.user_id == user_id).take(limit).cloned().collect()
    }
}

/// Thread-safe handle shared across handlers.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new(store: Store) -> Self { Self(Arc::new(Mutex::new(store))) }

    pub fn in_memory() -> Self { Self::new(Store::in_memory()) }

    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> { Ok(Self::new(Store::open(dir)?)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "x".into(),
            is_admin: false,
        }
    }

    fn changes(title: &str, genre: Genre) -> SeriesChanges {
        SeriesChanges {
            title: Some(title.into()),
            description: Some("desc".into()),
            year: Some(2020),
            genre: Some(genre),
            image: None,
        }
    }

    fn review(series: SeriesId, rating: u8) -> ReviewChanges {
        ReviewChanges { series: Some(series), text: Some("ok".into()), rating: Some(rating) }
    }

    #[test]
    fn usernames_and_emails_are_unique_case_insensitively() {
        let mut st = Store::in_memory();
        st.create_user(new_user("ana")).unwrap();
        let err = st.create_user(new_user("ANA")).unwrap_err();
        assert_eq!(err.http_status(), 400);
        let mut other = new_user("bia");
        other.email = "ANA@example.com".into();
        assert!(st.create_user(other).is_err());
        let bia = st.create_user(new_user("bia")).unwrap();
        assert!(st.update_user(bia.id, UserPatch { email: Some("ana@example.com".into()), ..Default::default() }).is_err());
    }

    #[test]
    fn deleting_user_cascades() {
        let mut st = Store::in_memory();
        let ana = st.create_user(new_user("ana")).unwrap();
        let bia = st.create_user(new_user("bia")).unwrap();
        let s1 = st.create_series(ana.id, changes("Dark", Genre::SciFi)).unwrap();
        let s2 = st.create_series(bia.id, changes("Lost", Genre::Drama)).unwrap();
        st.create_review(bia.id, review(s1.id, 5)).unwrap();
        let kept = st.create_review(ana.id, review(s2.id, 3)).unwrap();
        let bia_on_s2 = st.create_review(bia.id, review(s2.id, 4)).unwrap();
        st.record_activity(ana.id, ActivityKind::Review, "reviewed Lost").unwrap();

        st.delete_user(ana.id).unwrap();
        assert!(st.get_series(s1.id).is_err());
        assert!(st.get_review(kept.id).is_err());
        assert!(st.get_review(bia_on_s2.id).is_ok());
        assert_eq!(st.reviews_for_series(s1.id).len(), 0);
        assert!(st.activities_for(ana.id, 10).is_empty());
        assert!(st.profile(ana.id).is_err());
    }

    #[test]
    fn related_stats_and_summary() {
        let mut st = Store::in_memory();
        let ana = st.create_user(new_user("ana")).unwrap();
        let base = st.create_series(ana.id, changes("Base", Genre::Drama)).unwrap();
        for i in 0..5 {
            st.create_series(ana.id, changes(&format!("Drama {i}"), Genre::Drama)).unwrap();
        }
        st.create_series(ana.id, changes("Funny", Genre::Comedy)).unwrap();

        let related = st.related_series(base.id, RELATED_LIMIT).unwrap();
        assert_eq!(related.len(), 4);
        assert!(related.iter().all(|s| s.genre == Genre::Drama && s.id != base.id));
        assert_eq!(related[0].title, "Drama 4");

        let stats = st.stats(Utc::now());
        assert_eq!(stats.total_series, 7);
        assert_eq!(stats.series_by_genre.get("drama"), Some(&6));
        assert_eq!(stats.series_by_genre.get("comedy"), Some(&1));
        assert!(!stats.series_by_genre.contains_key("horror"));
        assert_eq!(stats.recent_series, 7);
        assert_eq!(st.stats(Utc::now() + Duration::days(8)).recent_series, 0);

        assert_eq!(st.review_summary(base.id), ReviewSummary { review_count: 0, average_rating: None });
        st.create_review(ana.id, review(base.id, 4)).unwrap();
        st.create_review(ana.id, review(base.id, 5)).unwrap();
        assert_eq!(st.review_summary(base.id).average_rating, Some(4.5));
    }

    #[test]
    fn review_requires_existing_series() {
        let mut st = Store::in_memory();
        let ana = st.create_user(new_user("ana")).unwrap();
        let err = st.create_review(ana.id, review(42, 3)).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn failed_snapshot_write_discards_the_change() {
        let tmp = tempfile::tempdir().unwrap();
        let mut st = Store::open(tmp.path()).unwrap();
        let ana = st.create_user(new_user("ana")).unwrap();

        // A non-empty directory where the snapshot lives makes the rename fail.
        let snapshot = tmp.path().join(SNAPSHOT_FILE);
        fs::remove_file(&snapshot).unwrap();
        fs::create_dir(&snapshot).unwrap();
        fs::write(snapshot.join("keep"), b"x").unwrap();

        let err = st.create_user(new_user("bia")).unwrap_err();
        assert_eq!(err.http_status(), 503);
        assert!(st.user_by_username("bia").is_none());
        assert!(st.delete_user(ana.id).is_err());
        assert!(st.get_user(ana.id).is_ok());
        assert!(!tmp.path().join("catalog.json.tmp").exists());

        fs::remove_dir_all(&snapshot).unwrap();
        let bia = st.create_user(new_user("bia")).unwrap();
        assert_eq!(bia.id, ana.id + 1);
        let reopened = Store::open(tmp.path()).unwrap();
        assert_eq!(reopened.list_users().len(), 2);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let ana_id = {
            let mut st = Store::open(tmp.path()).unwrap();
            let ana = st.create_user(new_user("ana")).unwrap();
            st.create_series(ana.id, changes("Dark", Genre::SciFi)).unwrap();
            ana.id
        };
        let mut st = Store::open(tmp.path()).unwrap();
        assert_eq!(st.user_by_username("ana").map(|u| u.id), Some(ana_id));
        assert_eq!(st.series_by(ana_id).len(), 1);
        // Ids keep counting from the snapshot.
        let bia = st.create_user(new_user("bia")).unwrap();
        assert_eq!(bia.id, ana_id + 1);
    }
}
