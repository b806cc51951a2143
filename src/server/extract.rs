//! Extractors: the per-request caller context and JSON bodies whose rejections
//! are reported in the common error format.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Json;
use tracing::debug;

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::resolve(&state.store, &state.sessions, &parts.headers)?;
        debug!(
            target: "serieshub::http",
            "request id={} {} {} identity={:?}",
            ctx.request_id, parts.method, parts.uri.path(), ctx.identity
        );
        Ok(ctx)
    }
}

/// Numeric id from a path segment; anything else is reported as a missing resource.
pub fn path_id(raw: &str, what: &str) -> AppResult<u64> {
    raw.parse::<u64>().map_err(|_| AppError::not_found(format!("{what}_not_found"), format!("{what} not found")))
}

/// Unwrap an optional JSON body extraction into the common error model.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(v)) => Ok(v),
        Err(rej) => Err(AppError::user("malformed_body".to_string(), rej.body_text())),
    }
}
