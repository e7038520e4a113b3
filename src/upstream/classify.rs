//! Heuristics for turning vendor responses into machine statuses.
//!
//! The vendor API is undocumented, so every pattern here is inferred from
//! observed traffic. A change on the vendor's side can silently shift results
//! towards `Unknown`; the patterns live here so they can be updated without
//! touching the probing code.

use crate::machine::MachineStatus;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;

lazy_static! {
    /// A checkout page the vendor hands out when a machine can be paid for.
    pub static ref CHECKOUT_URL: Regex =
        Regex::new(r#"(?i)https?://[^\s"'<>]+/(?:checkout|payments?|pay)\b[^\s"'<>]*"#).unwrap();
    /// Words the vendor uses when a machine is mid-cycle.
    pub static ref OCCUPIED_HINT: Regex =
        Regex::new(r"(?i)\b(?:running|occupied|in[\s_-]?use|busy|processing)\b").unwrap();
    static ref DRYER_TOKEN: Regex = Regex::new(r"[A-Za-z0-9+/=]+").unwrap();
}

fn string_leaves<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|item| string_leaves(item, out)),
        Value::Object(object) => object.values().for_each(|item| string_leaves(item, out)),
        _ => {}
    }
}

/// Looks for a checkout URL in the parsed body first, then in the raw text.
pub fn find_checkout_url(json: Option<&Value>, text: &str) -> Option<String> {
    let mut leaves = Vec::new();
    if let Some(json) = json {
        string_leaves(json, &mut leaves);
    }
    leaves
        .into_iter()
        .chain(std::iter::once(text))
        .find_map(|candidate| CHECKOUT_URL.find(candidate))
        .map(|found| found.as_str().to_string())
}

/// The vendor's own success shape: `{"status":"url","data":{"url":"..."}}`.
pub fn has_checkout_link(json: Option<&Value>) -> bool {
    json.map_or(false, |json| {
        json.get("status").and_then(Value::as_str) == Some("url")
            || json.pointer("/data/url").map_or(false, Value::is_string)
    })
}

pub fn looks_occupied(text: &str) -> bool {
    OCCUPIED_HINT.is_match(text)
}

/// Classifies the vendor's answer to a checkout-initiation probe.
pub fn classify_checkout(status: StatusCode, text: &str) -> MachineStatus {
    let json = serde_json::from_str::<Value>(text).ok();

    if status == StatusCode::OK {
        if has_checkout_link(json.as_ref()) || find_checkout_url(json.as_ref(), text).is_some() {
            return MachineStatus::Available;
        }
        if looks_occupied(text) {
            return MachineStatus::Occupied;
        }
        return MachineStatus::Unknown;
    }

    if status == StatusCode::CONFLICT || looks_occupied(text) {
        return MachineStatus::Occupied;
    }

    // 400s, other 2xx and everything else
    MachineStatus::Unknown
}

/// The trailing run of base64 characters once whitespace and quotes are gone.
pub fn dryer_token(text: &str) -> String {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '"' | '\''))
        .collect();
    DRYER_TOKEN
        .find_iter(&compact)
        .last()
        .map(|token| token.as_str().to_string())
        .unwrap_or_default()
}

/// Classifies the dryer status endpoint's answer.
///
/// A token ending in `==` has only ever been seen for idle dryers. Nothing in
/// the vendor protocol confirms what the token means.
pub fn classify_dryer(status: StatusCode, text: &str) -> MachineStatus {
    if !status.is_success() {
        return MachineStatus::Unknown;
    }
    if dryer_token(text).ends_with("==") {
        MachineStatus::Available
    } else {
        MachineStatus::Occupied
    }
}
