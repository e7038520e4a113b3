use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::config::parse_number;

lazy_static! {
    static ref DRYER_MARKER: Regex = Regex::new(r"(?i)-d\d*$").unwrap();
    static ref WASHER_MARKER: Regex = Regex::new(r"(?i)-w\d*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Washer,
    Dryer,
}

/// Decides the kind of machine from the suffix of its number or display name.
///
/// `A12-D3` and `a12-d` are dryers, `A12-W3` is a washer, and anything without
/// a marker is assumed to be a washer. The machine number is consulted first.
pub fn detect_kind(machine_no: &str, name: &str) -> MachineKind {
    for field in [machine_no.trim(), name.trim()] {
        if DRYER_MARKER.is_match(field) {
            return MachineKind::Dryer;
        }
        if WASHER_MARKER.is_match(field) {
            return MachineKind::Washer;
        }
    }
    MachineKind::Washer
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MachineStatus {
    Available,
    Occupied,
    Unknown,
    Error,
}

/// Stringifies `value`, truncates it to `max` characters and drops everything
/// but ASCII letters, digits, `_`, `-` and `.`.
pub fn sanitize(value: &Value, max: usize) -> String {
    let raw = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.chars()
        .take(max)
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Accepts a JSON number or a string holding one.
pub fn numeric(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Any non-empty scalar, as the string the vendor expects.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) | Value::Array(_) | Value::Object(_) => None,
        Value::String(s) => non_empty(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// A machine to probe, cleaned up from whatever the client sent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MachineDescriptor {
    pub id: String,
    pub name: String,
    pub machine_no: String,
    pub label: Option<String>,
    pub amount: Option<Number>,
    pub duration: Option<Number>,
    pub mode: Option<String>,
    pub temperature: Option<String>,
    pub payment_amount: Option<String>,
}

impl MachineDescriptor {
    pub fn from_json(raw: &Value) -> Self {
        let field = |key: &str| raw.get(key).unwrap_or(&Value::Null);
        let name = sanitize(field("name"), 128);
        MachineDescriptor {
            id: sanitize(field("id"), 64),
            name: if name.is_empty() {
                String::from("GENERIC")
            } else {
                name
            },
            machine_no: sanitize(field("machineNo"), 128),
            label: non_empty(sanitize(field("label"), 128)),
            amount: numeric(field("amount")),
            duration: numeric(field("duration")),
            mode: non_empty(sanitize(field("mode"), 16)),
            temperature: non_empty(sanitize(field("temperature"), 16)),
            payment_amount: scalar_string(field("paymentAmount")),
        }
    }

    /// The id reported back to the client.
    pub fn result_id(&self) -> &str {
        if self.id.is_empty() {
            &self.machine_no
        } else {
            &self.id
        }
    }

    pub fn kind(&self) -> MachineKind {
        detect_kind(&self.machine_no, &self.name)
    }
}
