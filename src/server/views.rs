//! Response shapes. Entities are rendered through these views so the API never
//! exposes stored-only fields such as password hashes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::catalog::{Genre, Review, Series, User, UserActivity, UserProfile};
use crate::config::ServerConfig;
use crate::policy::UserId;
use crate::storage::{ReviewSummary, Store};

#[derive(Debug, Clone, Serialize)]
pub struct GenreView {
    pub key: &'static str,
    pub label: &'static str,
    pub color: &'static str,
}

impl From<Genre> for GenreView {
    fn from(g: Genre) -> Self { Self { key: g.key(), label: g.label(), color: g.color() } }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesListItem {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub year: u16,
    pub genre: Genre,
    pub genre_display: &'static str,
    pub genre_color: &'static str,
    pub image_url: Option<String>,
    pub created_by_username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesView {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub year: u16,
    pub genre: Genre,
    pub genre_display: &'static str,
    pub genre_color: &'static str,
    pub image: Option<String>,
    pub image_url: Option<String>,
    pub created_by: UserId,
    pub created_by_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub reviews: ReviewSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: u64,
    pub series: u64,
    pub series_title: String,
    pub user: UserId,
    pub username: String,
    pub text: String,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub bio: String,
    pub avatar: Option<String>,
    pub avatar_url: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub website: String,
    pub email_notifications: bool,
    pub favorite_genres: Vec<GenreView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub is_admin: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub profile: ProfileView,
    pub series_count: usize,
}

/// Flat profile summary served at `/api/v1/profile/`.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub website: String,
    pub birth_date: Option<NaiveDate>,
    pub email_notifications: bool,
    /// Calendar date only (`YYYY-MM-DD`).
    pub date_joined: String,
    pub series_count: usize,
    pub reviews_count: usize,
    pub favorite_genres: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: crate::catalog::ActivityKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserActivity> for ActivityView {
    fn from(a: UserActivity) -> Self { Self { id: a.id, kind: a.kind, description: a.description, created_at: a.created_at } }
}

/// Renders entities against the store (for joined names and counts) and the
/// configured media prefix.
pub struct Render<'a> {
    pub store: &'a Store,
    pub config: &'a ServerConfig,
}

impl<'a> Render<'a> {
    pub fn new(store: &'a Store, config: &'a ServerConfig) -> Self { Self { store, config } }

    fn username(&self, id: UserId) -> String {
        self.store.get_user(id).map(|u| u.username).unwrap_or_default()
    }

    fn media(&self, name: &Option<String>) -> Option<String> {
        name.as_deref().map(|n| self.config.media_url_for(n))
    }

    pub fn series_item(&self, s: &Series) -> SeriesListItem {
        SeriesListItem {
            id: s.id,
            title: s.title.clone(),
            description: s.description.clone(),
            year: s.year,
            genre: s.genre,
            genre_display: s.genre.label(),
            genre_color: s.genre.color(),
            image_url: self.media(&s.image),
            created_by_username: self.username(s.created_by),
            created_at: s.created_at,
        }
    }

    pub fn series_list(&self, list: &[Series]) -> Vec<SeriesListItem> {
        list.iter().map(|s| self.series_item(s)).collect()
    }

    pub fn series(&self, s: &Series) -> SeriesView {
        SeriesView {
            id: s.id,
            title: s.title.clone(),
            description: s.description.clone(),
            year: s.year,
            genre: s.genre,
            genre_display: s.genre.label(),
            genre_color: s.genre.color(),
            image: s.image.clone(),
            image_url: self.media(&s.image),
            created_by: s.created_by,
            created_by_username: self.username(s.created_by),
            created_at: s.created_at,
            updated_at: s.updated_at,
            reviews: self.store.review_summary(s.id),
        }
    }

    pub fn review(&self, r: &Review) -> ReviewView {
        ReviewView {
            id: r.id,
            series: r.series_id,
            series_title: self.store.get_series(r.series_id).map(|s| s.title).unwrap_or_default(),
            user: r.user_id,
            username: self.username(r.user_id),
            text: r.text.clone(),
            rating: r.rating,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }

    pub fn reviews(&self, list: &[Review]) -> Vec<ReviewView> {
        list.iter().map(|r| self.review(r)).collect()
    }

    pub fn profile(&self, p: &UserProfile) -> ProfileView {
        ProfileView {
            bio: p.bio.clone(),
            avatar: p.avatar.clone(),
            avatar_url: self.media(&p.avatar),
            birth_date: p.birth_date,
            website: p.website.clone(),
            email_notifications: p.email_notifications,
            favorite_genres: p.favorite_genres.iter().copied().map(GenreView::from).collect(),
            created_at: p.created_at,
        }
    }

    /// `profile` is passed in because the store creates missing profiles lazily
    /// and that needs a mutable borrow.
    pub fn user(&self, u: &User, profile: &UserProfile) -> UserView {
        UserView {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            full_name: u.full_name(),
            is_admin: u.is_admin,
            date_joined: u.date_joined,
            last_login: u.last_login,
            profile: self.profile(profile),
            series_count: self.store.series_count(u.id),
        }
    }

    pub fn formatted_profile(&self, u: &User, p: &UserProfile) -> FormattedProfile {
        FormattedProfile {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            avatar_url: self.media(&p.avatar),
            bio: p.bio.clone(),
            website: p.website.clone(),
            birth_date: p.birth_date,
            email_notifications: p.email_notifications,
            date_joined: u.date_joined.format("%Y-%m-%d").to_string(),
            series_count: self.store.series_count(u.id),
            reviews_count: self.store.review_count_by(u.id),
            favorite_genres: p.favorite_genres.iter().map(|g| g.label()).collect(),
        }
    }
}

/// Render a user, creating the profile on first access.
pub fn user_view(store: &mut Store, config: &ServerConfig, user: &User) -> crate::error::AppResult<UserView> {
    let profile = store.profile(user.id)?;
    Ok(Render::new(store, config).user(user, &profile))
}
