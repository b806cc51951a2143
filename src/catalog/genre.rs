use serde::{Deserialize, Serialize};

/// Closed set of series genres. The serialized value is the stable API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Action,
    Adventure,
    Comedy,
    Drama,
    Fantasy,
    SciFi,
    Horror,
    Romance,
    Suspense,
    Terror,
    Thriller,
    Documentary,
    Animation,
    Other,
}

impl Genre {
    pub const ALL: [Genre; 14] = [
        Genre::Action,
        Genre::Adventure,
        Genre::Comedy,
        Genre::Drama,
        Genre::Fantasy,
        Genre::SciFi,
        Genre::Horror,
        Genre::Romance,
        Genre::Suspense,
        Genre::Terror,
        Genre::Thriller,
        Genre::Documentary,
        Genre::Animation,
        Genre::Other,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Genre::Action => "action",
            Genre::Adventure => "adventure",
            Genre::Comedy => "comedy",
            Genre::Drama => "drama",
            Genre::Fantasy => "fantasy",
            Genre::SciFi => "sci_fi",
            Genre::Horror => "horror",
            Genre::Romance => "romance",
            Genre::Suspense => "suspense",
            Genre::Terror => "terror",
            Genre::Thriller => "thriller",
            Genre::Documentary => "documentary",
            Genre::Animation => "animation",
            Genre::Other => "other",
        }
    }

    pub fn from_key(key: &str) -> Option<Genre> {
        let k = key.trim();
        Genre::ALL.into_iter().find(|g| g.key().eq_ignore_ascii_case(k))
    }

    pub fn label(self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Comedy => "Comedy",
            Genre::Drama => "Drama",
            Genre::Fantasy => "Fantasy",
            Genre::SciFi => "Science Fiction",
            Genre::Horror => "Horror",
            Genre::Romance => "Romance",
            Genre::Suspense => "Suspense",
            Genre::Terror => "Terror",
            Genre::Thriller => "Thriller",
            Genre::Documentary => "Documentary",
            Genre::Animation => "Animation",
            Genre::Other => "Other",
        }
    }

    /// CSS colour class used by the pages to badge a genre.
    pub fn color(self) -> &'static str {
        match self {
            Genre::Action => "danger",
            Genre::Adventure => "warning",
            Genre::Comedy => "success",
            Genre::Drama => "primary",
            Genre::Fantasy => "info",
            Genre::SciFi => "secondary",
            Genre::Horror | Genre::Terror => "dark",
            Genre::Romance => "pink",
            Genre::Suspense => "purple",
            Genre::Thriller => "indigo",
            Genre::Documentary => "teal",
            Genre::Animation => "orange",
            Genre::Other => "gray",
        }
    }
}
