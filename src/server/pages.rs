//! Minimal server-rendered pages. Every user-supplied string is HTML-escaped.

use std::fmt::Write as _;

use axum::extract::{Path, State};
use axum::response::Html;

use super::extract::path_id;
use super::AppState;
use crate::catalog::{Review, Series};
use crate::error::AppResult;
use crate::storage::Store;

const INDEX_LATEST: usize = 6;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, content: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{} | SeriesHub</title></head>\n<body>\n<nav><a href=\"/\">SeriesHub</a> | <a href=\"/series/\">Series</a></nav>\n<main>\n{}</main>\n</body>\n</html>\n",
        escape(title),
        content
    ))
}

fn series_items(store: &Store, list: &[Series]) -> String {
    if list.is_empty() {
        return "<p>No series yet.</p>\n".to_string();
    }
    let mut out = String::from("<ul class=\"series\">\n");
    for s in list {
        let author = store.get_user(s.created_by).map(|u| u.username).unwrap_or_default();
        let _ = writeln!(
            out,
            "<li><a href=\"/series/{}/\">{}</a> ({}) <span class=\"badge bg-{}\">{}</span> by {}</li>",
            s.id,
            escape(&s.title),
            s.year,
            s.genre.color(),
            s.genre.label(),
            escape(&author)
        );
    }
    out.push_str("</ul>\n");
    out
}

fn review_items(store: &Store, list: &[Review]) -> String {
    if list.is_empty() {
        return "<p>No reviews yet.</p>\n".to_string();
    }
    let mut out = String::from("<ul class=\"reviews\">\n");
    for r in list {
        let author = store.get_user(r.user_id).map(|u| u.username).unwrap_or_default();
        let _ = writeln!(out, "<li><strong>{}</strong> {}/5: {}</li>", escape(&author), r.rating, escape(&r.text));
    }
    out.push_str("</ul>\n");
    out
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let store = state.store.0.lock();
    let latest: Vec<Series> = store.list_series().into_iter().take(INDEX_LATEST).collect();
    let content = format!("<h1>SeriesHub</h1>\n<h2>Latest series</h2>\n{}", series_items(&store, &latest));
    layout("Home", &content)
}

pub async fn series_list(State(state): State<AppState>) -> Html<String> {
    let store = state.store.0.lock();
    let list = store.list_series();
    let content = format!("<h1>All series</h1>\n{}", series_items(&store, &list));
    layout("Series", &content)
}

pub async fn series_detail(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Html<String>> {
    let store = state.store.0.lock();
    let s = store.get_series(path_id(&id, "series")?)?;
    let summary = store.review_summary(s.id);
    let rating = summary.average_rating.map(|a| format!("{a:.1}/5")).unwrap_or_else(|| "not rated".to_string());
    let mut content = format!(
        "<h1>{}</h1>\n<p class=\"meta\">{} | <span class=\"badge bg-{}\">{}</span> | {} ({} reviews)</p>\n",
        escape(&s.title),
        s.year,
        s.genre.color(),
        s.genre.label(),
        rating,
        summary.review_count
    );
    if let Some(img) = &s.image {
        let _ = writeln!(content, "<img src=\"{}\" alt=\"{}\">", escape(&state.config.media_url_for(img)), escape(&s.title));
    }
    let _ = writeln!(content, "<p>{}</p>", escape(&s.description));
    content.push_str("<h2>Reviews</h2>\n");
    content.push_str(&review_items(&store, &store.reviews_for_series(s.id)));
    Ok(layout(&s.title, &content))
}

pub async fn health() -> &'static str { "serieshub ok" }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<script>alert('x')</script> & \"q\""), "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt; &amp; &quot;q&quot;");
        assert_eq!(escape("plain"), "plain");
    }
}
