use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// A source of configuration values, read on every request.
pub trait EnvSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

pub type SharedEnv = Arc<dyn EnvSource>;

/// Reads the live process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Returns the first candidate key whose value is present and not blank.
pub fn resolve_first<S: AsRef<str>>(env: &dyn EnvSource, keys: &[S]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env.get(key.as_ref()))
        .find(|value| !value.trim().is_empty())
}

/// Returns the first candidate value that parses as a non-empty JSON object.
pub fn resolve_json_object<S: AsRef<str>>(
    env: &dyn EnvSource,
    keys: &[S],
) -> Option<Map<String, Value>> {
    keys.iter()
        .filter_map(|key| env.get(key.as_ref()))
        .filter_map(|raw| match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(object)) if !object.is_empty() => Some(object),
            _ => None,
        })
        .next()
}

/// Parses a JSON value stored in the environment, falling back on any failure.
pub fn parse_json_env(env: &dyn EnvSource, key: &str) -> Option<Value> {
    let raw = env.get(key)?;
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring {}, it is not valid JSON: {}", key, e);
            None
        }
    }
}

/// `BASE_PAYLOAD_JSON` + `north-block` => `BASE_PAYLOAD_JSON_NORTH_BLOCK`
pub fn hostel_key(prefix: &str, hostel: &str) -> String {
    let suffix: String = hostel
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", prefix, suffix)
}

/// Candidate keys for a setting: hostel-scoped variants first, then the generic ones.
pub fn scoped_keys(prefixes: &[&str], hostel: Option<&str>) -> Vec<String> {
    let mut keys = Vec::with_capacity(prefixes.len() * 2);
    if let Some(hostel) = hostel.filter(|h| !h.is_empty()) {
        keys.extend(prefixes.iter().map(|prefix| hostel_key(prefix, hostel)));
    }
    keys.extend(prefixes.iter().map(|prefix| prefix.to_string()));
    keys
}

/// Parses a number the way a JSON document would spell it, keeping integers integral.
pub fn parse_number(raw: &str) -> Option<Number> {
    let raw = raw.trim();
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Number::from(int));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

fn number_or(env: &dyn EnvSource, key: &str, fallback: &str) -> Number {
    env.get(key)
        .and_then(|raw| parse_number(&raw))
        .or_else(|| parse_number(fallback))
        .unwrap_or_else(|| Number::from(0))
}

fn string_or(env: &dyn EnvSource, key: &str, fallback: &str) -> String {
    env.get(key)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Settings for the checkout-initiation probe sent to the vendor.
#[derive(Debug, Clone, Default)]
pub struct UpstreamSettings {
    pub endpoint: Option<String>,
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub x_requested_with: Option<String>,
    pub extra_headers: Vec<(String, String)>,
    pub dryer_status_endpoint: Option<String>,
    pub timeout: Option<Duration>,
}

impl UpstreamSettings {
    pub fn from_env(env: &dyn EnvSource) -> Self {
        let non_empty = |key: &str| env.get(key).filter(|v| !v.trim().is_empty());
        UpstreamSettings {
            endpoint: non_empty("UPSTREAM_ENDPOINT"),
            origin: non_empty("UPSTREAM_ORIGIN"),
            referer: non_empty("UPSTREAM_REFERER"),
            x_requested_with: non_empty("UPSTREAM_X_REQUESTED_WITH"),
            extra_headers: extra_headers(env),
            dryer_status_endpoint: non_empty("DRYER_STATUS_ENDPOINT"),
            timeout: non_empty("UPSTREAM_TIMEOUT_SECS")
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

fn extra_headers(env: &dyn EnvSource) -> Vec<(String, String)> {
    match parse_json_env(env, "UPSTREAM_HEADERS_JSON") {
        Some(Value::Object(headers)) => headers
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (name, value)
            })
            .filter(|(_, value)| !value.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Fallback values for the fields a probe body always carries.
#[derive(Debug, Clone, PartialEq)]
pub struct KindDefaults {
    pub amount: Number,
    pub duration: Number,
    pub mode: Option<String>,
    pub temperature: Option<String>,
}

impl KindDefaults {
    pub fn washer(env: &dyn EnvSource) -> Self {
        KindDefaults {
            amount: number_or(env, "DEFAULT_AMOUNT", "4.5"),
            duration: number_or(env, "DEFAULT_DURATION", "37"),
            mode: Some(string_or(env, "DEFAULT_MODE", "warm")),
            temperature: None,
        }
    }

    pub fn dryer(env: &dyn EnvSource) -> Self {
        KindDefaults {
            amount: number_or(env, "DEFAULT_DRYER_AMOUNT", "4.5"),
            duration: number_or(env, "DEFAULT_DRYER_DURATION", "45"),
            mode: None,
            temperature: Some(string_or(env, "DEFAULT_DRYER_TEMPERATURE", "medium")),
        }
    }
}

/// Operator identifier the dryer status endpoint expects alongside a machine number.
pub fn dryer_operator_id(env: &dyn EnvSource, hostel: Option<&str>) -> Option<String> {
    resolve_first(
        env,
        &scoped_keys(&["DRYER_OPERATOR_ID", "OPERATOR_ID"], hostel)[..],
    )
    .map(|id| id.trim().to_string())
}
