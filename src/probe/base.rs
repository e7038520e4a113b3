use crate::config::{hostel_key, resolve_json_object, EnvSource};
use crate::machine::MachineKind;
use serde_json::{json, Map, Value};

const LEGACY_BASE_KEY: &str = "BASE_PAYLOAD_JSON";

fn kind_key(kind: MachineKind) -> &'static str {
    match kind {
        MachineKind::Washer => "BASE_WASHER_PAYLOAD_JSON",
        MachineKind::Dryer => "BASE_DRYER_PAYLOAD_JSON",
    }
}

/// Template used when nothing in the environment provides one.
pub fn builtin_base(kind: MachineKind) -> Map<String, Value> {
    let template = match kind {
        MachineKind::Washer => json!({
            "machine": { "type": "WASHER" },
            "outlet": {},
            "paymentMethod": "CARD",
        }),
        MachineKind::Dryer => json!({
            "machine": { "type": "DRYER" },
            "outlet": {},
            "paymentMethod": "CARD",
        }),
    };
    match template {
        Value::Object(object) => object,
        _ => Map::new(),
    }
}

/// Candidate environment keys for a base payload, most specific first.
pub fn base_keys(kind: MachineKind, hostel: Option<&str>) -> Vec<String> {
    let mut keys = Vec::with_capacity(3);
    if let Some(hostel) = hostel.filter(|h| !h.is_empty()) {
        keys.push(hostel_key(kind_key(kind), hostel));
    }
    keys.push(kind_key(kind).to_string());
    keys.push(LEGACY_BASE_KEY.to_string());
    keys
}

/// Resolves the template a probe body is built on.
pub fn resolve_base(
    env: &dyn EnvSource,
    kind: MachineKind,
    hostel: Option<&str>,
) -> Map<String, Value> {
    let keys = base_keys(kind, hostel);
    match resolve_json_object(env, &keys[..]) {
        Some(base) => base,
        None => {
            log::debug!(
                "No base payload configured for {:?} (tried {:?}), using the built-in one",
                kind,
                keys
            );
            builtin_base(kind)
        }
    }
}
