use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::genre::Genre;
use super::validate::{self, Validator};
use super::{double_option, ImageUpload};
use crate::error::AppResult;
use crate::policy::{OwnerRef, UserId};

pub type SeriesId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Series {
    pub id: SeriesId,
    pub title: String,
    pub description: String,
    pub year: u16,
    pub genre: Genre,
    #[serde(default)]
    pub image: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnerRef for Series {
    fn creator(&self) -> Option<UserId> { Some(self.created_by) }
}

/// Raw create/update payload. Genre arrives as a string so an unknown key is
/// reported as a field error rather than a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub image: Option<Option<ImageUpload>>,
}

/// Validated changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub year: Option<u16>,
    pub genre: Option<Genre>,
    pub image: Option<Option<String>>,
}

impl SeriesInput {
    /// `partial` is true for PATCH. Create and PUT require title, description and year.
    pub fn validate(self, partial: bool) -> AppResult<SeriesChanges> {
        let mut v = Validator::new();
        let mut out = SeriesChanges::default();
        if !partial {
            if self.title.is_none() { v.fail("title", "this field is required"); }
            if self.description.is_none() { v.fail("description", "this field is required"); }
            if self.year.is_none() { v.fail("year", "this field is required"); }
        }
        if let Some(t) = self.title { out.title = v.check("title", validate::title(&t)); }
        if let Some(d) = self.description { out.description = v.check("description", validate::description(&d)); }
        if let Some(y) = self.year { out.year = v.check("year", validate::year(y)); }
        if let Some(g) = self.genre {
            out.genre = v.check("genre", Genre::from_key(&g).ok_or_else(|| format!("\"{g}\" is not a valid choice")));
        }
        match self.image {
            Some(Some(img)) => {
                if let Some(name) = v.check("image", validate::image(&img.name, img.size)) {
                    out.image = Some(Some(name));
                }
            }
            Some(None) => out.image = Some(None),
            None => {}
        }
        v.finish()?;
        Ok(out)
    }
}

impl Series {
    pub fn apply(&mut self, changes: SeriesChanges, now: DateTime<Utc>) {
        if let Some(t) = changes.title { self.title = t; }
        if let Some(d) = changes.description { self.description = d; }
        if let Some(y) = changes.year { self.year = y; }
        if let Some(g) = changes.genre { self.genre = g; }
        if let Some(i) = changes.image { self.image = i; }
        self.updated_at = now;
    }
}
