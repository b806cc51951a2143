use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::series::SeriesId;
use super::validate::{self, Validator};
use crate::error::AppResult;
use crate::policy::{OwnerRef, UserId};

pub type ReviewId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: ReviewId,
    pub series_id: SeriesId,
    pub user_id: UserId,
    pub text: String,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnerRef for Review {
    fn user(&self) -> Option<UserId> { Some(self.user_id) }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewInput {
    #[serde(default)]
    pub series: Option<SeriesId>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewChanges {
    pub series: Option<SeriesId>,
    pub text: Option<String>,
    pub rating: Option<u8>,
}

impl ReviewInput {
    /// Create needs every field; updates never move a review to another series.
    pub fn validate_create(self) -> AppResult<ReviewChanges> {
        let mut v = Validator::new();
        let series = v.check("series", validate::required(self.series));
        let text = v.check("text", validate::required(self.text).and_then(|t| validate::review_text(&t)));
        let rating = v.check("rating", validate::required(self.rating).and_then(validate::rating));
        v.finish()?;
        Ok(ReviewChanges { series, text, rating })
    }

    pub fn validate_update(self, current: &Review, partial: bool) -> AppResult<ReviewChanges> {
        let mut v = Validator::new();
        if let Some(s) = self.series {
            if s != current.series_id { v.fail("series", "a review cannot be moved to another series"); }
        }
        if !partial {
            if self.text.is_none() { v.fail("text", "this field is required"); }
            if self.rating.is_none() { v.fail("rating", "this field is required"); }
        }
        let text = self.text.and_then(|t| v.check("text", validate::review_text(&t)));
        let rating = self.rating.and_then(|r| v.check("rating", validate::rating(r)));
        v.finish()?;
        Ok(ReviewChanges { series: None, text, rating })
    }
}

impl Review {
    pub fn apply(&mut self, changes: ReviewChanges, now: DateTime<Utc>) {
        if let Some(t) = changes.text { self.text = t; }
        if let Some(r) = changes.rating { self.rating = r; }
        self.updated_at = now;
    }
}
