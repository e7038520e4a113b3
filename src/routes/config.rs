use super::json_response;
use crate::config::SharedEnv;
use crate::machine::sanitize;
use crate::site::site_config;
use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;
use std::collections::HashMap;

// GET /api/config[?hostel=ID]
pub async fn handle(
    Extension(env): Extension<SharedEnv>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let hostel = params
        .get("hostel")
        .map(|hostel| sanitize(&Value::String(hostel.to_owned()), 64))
        .filter(|hostel| !hostel.is_empty());

    json_response(StatusCode::OK, site_config(env.as_ref(), hostel.as_deref()))
}
