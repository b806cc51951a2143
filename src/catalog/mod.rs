//! Catalog entities (users, profiles, series, reviews, activities) and the
//! validation applied to incoming payloads before they reach the store.

mod genre;
mod review;
mod series;
mod user;
pub mod validate;

pub use genre::Genre;
pub use review::{Review, ReviewChanges, ReviewId, ReviewInput};
pub use series::{Series, SeriesChanges, SeriesId, SeriesInput};
pub use user::{ActivityKind, NewUser, ProfilePatch, User, UserActivity, UserPatch, UserProfile};

use serde::{Deserialize, Deserializer};

/// Image reference supplied by a client. Only the file name is stored; the
/// declared size is checked against the upload limit.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ImageUpload {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
