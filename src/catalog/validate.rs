//! Field validation rules shared by the API payloads.
//! Each rule returns the cleaned value or a human readable message; `Validator`
//! gathers the messages per field so one response reports every problem at once.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult, FieldErrors};

pub const MIN_YEAR: i64 = 1900;
pub const MAX_YEAR: i64 = 2030;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_ACTIVITY_CHARS: usize = 255;
pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]{1,150}$").expect("username regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url regex"));

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self { Self::default() }

    /// Record the outcome of one rule; returns the cleaned value when it passed.
    pub fn check<T>(&mut self, field: &str, outcome: Result<T, String>) -> Option<T> {
        match outcome {
            Ok(v) => Some(v),
            Err(msg) => { self.fail(field, msg); None }
        }
    }

    pub fn fail<M: Into<String>>(&mut self, field: &str, msg: M) {
        self.errors.entry(field.to_string()).or_default().push(msg.into());
    }

    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() { Ok(()) } else { Err(AppError::validation(self.errors)) }
    }
}

pub fn required<T>(value: Option<T>) -> Result<T, String> {
    value.ok_or_else(|| "this field is required".to_string())
}

pub fn title(raw: &str) -> Result<String, String> {
    let t = raw.trim();
    let n = t.chars().count();
    if n < 2 { return Err("title must be at least 2 characters".into()); }
    if n > MAX_TITLE_CHARS { return Err(format!("title must be at most {MAX_TITLE_CHARS} characters")); }
    Ok(t.to_string())
}

pub fn description(raw: &str) -> Result<String, String> {
    let d = raw.trim();
    if d.is_empty() { return Err("description may not be blank".into()); }
    Ok(d.to_string())
}

pub fn year(v: i64) -> Result<u16, String> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&v) {
        return Err(format!("year must be between {MIN_YEAR} and {MAX_YEAR}"));
    }
    Ok(v as u16)
}

/// Validate an uploaded image reference: a bare file name with an allowed
/// extension and a declared size within the limit.
pub fn image(name: &str, size: u64) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err("invalid image file name".into());
    }
    if size > MAX_IMAGE_BYTES {
        return Err("image must be at most 5MB".into());
    }
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(format!("allowed extensions: {}", IMAGE_EXTENSIONS.join(", ")));
    }
    Ok(name.to_string())
}

pub fn username(raw: &str) -> Result<String, String> {
    let u = raw.trim();
    if !USERNAME_RE.is_match(u) {
        return Err("enter a valid username: up to 150 letters, digits and @/./+/-/_ characters".into());
    }
    Ok(u.to_string())
}

pub fn email(raw: &str) -> Result<String, String> {
    let e = raw.trim();
    if !EMAIL_RE.is_match(e) { return Err("enter a valid email address".into()); }
    Ok(e.to_ascii_lowercase())
}

pub fn password(raw: &str) -> Result<String, String> {
    if raw.chars().count() < MIN_PASSWORD_CHARS {
        return Err(format!("password must be at least {MIN_PASSWORD_CHARS} characters"));
    }
    Ok(raw.to_string())
}

pub fn passwords_match(a: &str, b: &str) -> Result<(), String> {
    if a != b { return Err("passwords do not match".into()); }
    Ok(())
}

pub fn bio(raw: &str) -> Result<String, String> {
    if raw.chars().count() > MAX_BIO_CHARS { return Err(format!("bio must be at most {MAX_BIO_CHARS} characters")); }
    Ok(raw.to_string())
}

/// Empty string clears the website.
pub fn website(raw: &str) -> Result<String, String> {
    let w = raw.trim();
    if w.is_empty() { return Ok(String::new()); }
    if !URL_RE.is_match(w) { return Err("enter a valid URL".into()); }
    Ok(w.to_string())
}

pub fn rating(v: i64) -> Result<u8, String> {
    if !(1..=5).contains(&v) { return Err("rating must be between 1 and 5".into()); }
    Ok(v as u8)
}

pub fn review_text(raw: &str) -> Result<String, String> {
    let t = raw.trim();
    if t.is_empty() { return Err("review text may not be blank".into()); }
    Ok(t.to_string())
}

pub fn activity_description(raw: &str) -> String {
    raw.chars().take(MAX_ACTIVITY_CHARS).collect()
}
