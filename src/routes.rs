use crate::config::SharedEnv;
use crate::upstream::client::UpstreamClient;
use axum::extract::Extension;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

pub mod check;
pub mod config;

/// Maps the API routes to their handlers. Both handlers accept any method and
/// decide for themselves what to reject.
pub fn router(env: SharedEnv, client: UpstreamClient) -> Router {
    Router::new()
        .route("/api/check", any(check::handle))
        .route("/api/config", any(config::handle))
        .layer(Extension(env))
        .layer(Extension(client))
}

/// A JSON response the browser must never cache.
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut res = (status, Json(body)).into_response();
    res.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    res
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    json_response(status, json!({ "error": message }))
}

/// Current time as an ISO-8601 UTC timestamp with milliseconds.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
