use crate::config::KindDefaults;
use crate::machine::{numeric, sanitize, scalar_string, MachineDescriptor, MachineKind};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// A set of optional field values laid over a probe body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbePatch {
    pub amount: Option<Number>,
    pub duration: Option<Number>,
    pub mode: Option<String>,
    pub temperature: Option<String>,
    pub payment_amount: Option<String>,
}

impl ProbePatch {
    /// Site-wide `defaults` as sent by the dashboard.
    pub fn from_json(raw: &Value) -> Self {
        let field = |key: &str| raw.get(key).unwrap_or(&Value::Null);
        let short = |key: &str| Some(sanitize(field(key), 16)).filter(|s| !s.is_empty());
        ProbePatch {
            amount: numeric(field("amount")),
            duration: numeric(field("duration")),
            mode: short("mode"),
            temperature: short("temperature"),
            payment_amount: scalar_string(field("paymentAmount")),
        }
    }

    pub fn from_machine(machine: &MachineDescriptor) -> Self {
        ProbePatch {
            amount: machine.amount.clone(),
            duration: machine.duration.clone(),
            mode: machine.mode.clone(),
            temperature: machine.temperature.clone(),
            payment_amount: machine.payment_amount.clone(),
        }
    }

    fn from_defaults(defaults: &KindDefaults) -> Self {
        ProbePatch {
            amount: Some(defaults.amount.clone()),
            duration: Some(defaults.duration.clone()),
            mode: defaults.mode.clone(),
            temperature: defaults.temperature.clone(),
            payment_amount: None,
        }
    }

    /// The values a base template already carries.
    fn read(base: &Map<String, Value>) -> Self {
        let text = |key: &str| match base.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        let number = |key: &str| match base.get(key) {
            Some(Value::Number(n)) => Some(n.clone()),
            _ => None,
        };
        ProbePatch {
            amount: number("amount"),
            duration: number("duration"),
            mode: text("mode"),
            temperature: text("temperature"),
            payment_amount: base.get("paymentAmount").and_then(scalar_string),
        }
    }

    /// Fills only the fields that are still unset.
    pub fn fill(&mut self, fallback: &ProbePatch) {
        self.amount = self.amount.take().or_else(|| fallback.amount.clone());
        self.duration = self.duration.take().or_else(|| fallback.duration.clone());
        self.mode = self.mode.take().or_else(|| fallback.mode.clone());
        self.temperature = self.temperature.take().or_else(|| fallback.temperature.clone());
        self.payment_amount = self
            .payment_amount
            .take()
            .or_else(|| fallback.payment_amount.clone());
    }

    /// Overwrites every field the overlay specifies.
    pub fn apply(&mut self, overlay: &ProbePatch) {
        if let Some(amount) = &overlay.amount {
            self.amount = Some(amount.clone());
        }
        if let Some(duration) = &overlay.duration {
            self.duration = Some(duration.clone());
        }
        if let Some(mode) = &overlay.mode {
            self.mode = Some(mode.clone());
        }
        if let Some(temperature) = &overlay.temperature {
            self.temperature = Some(temperature.clone());
        }
        if let Some(payment_amount) = &overlay.payment_amount {
            self.payment_amount = Some(payment_amount.clone());
        }
    }
}

/// The JSON body of a single probe, shaped like the vendor's checkout payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbeBody(Map<String, Value>);

impl ProbeBody {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn machine_no(&self) -> Option<&str> {
        self.0
            .get("outlet")
            .and_then(|outlet| outlet.get("machineNo"))
            .and_then(Value::as_str)
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.0)
    }
}

fn set_nested(body: &mut Map<String, Value>, parent: &str, key: &str, value: &str) {
    let slot = body
        .entry(parent)
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(object) = slot {
        object.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Formats an amount the way the vendor spells payment amounts, e.g. `4.50`.
///
/// Ties round away from zero, so `4.125` becomes `4.13`.
pub fn payment_amount(amount: &Number) -> Option<String> {
    amount
        .as_f64()
        .and_then(Decimal::from_f64_retain)
        .map(|value| value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .map(|value| format!("{:.2}", value))
}

/// Builds a probe body for `machine` on top of `base`.
///
/// Layers are applied in order: kind defaults fill whatever the base leaves
/// unset, then the site-wide patches and finally the machine's own overrides
/// overwrite the fields they name. The field belonging to the other kind of
/// machine is removed.
pub fn build_probe(
    base: Map<String, Value>,
    machine: &MachineDescriptor,
    kind: MachineKind,
    defaults: &KindDefaults,
    patches: &[ProbePatch],
    now: &str,
) -> ProbeBody {
    let mut body = base;
    set_nested(&mut body, "machine", "name", &machine.name);
    set_nested(&mut body, "outlet", "machineNo", &machine.machine_no);
    if is_falsy(body.get("time")) {
        body.insert(String::from("time"), Value::String(now.to_string()));
    }

    let mut fields = ProbePatch::read(&body);
    // A base amount nobody overrides is sent exactly as the template spells it
    let keep_base_payment = fields.payment_amount.is_some()
        && patches.iter().all(|patch| patch.payment_amount.is_none());
    fields.fill(&ProbePatch::from_defaults(defaults));
    for patch in patches {
        fields.apply(patch);
    }
    if fields.payment_amount.is_none() {
        fields.payment_amount = fields.amount.as_ref().and_then(payment_amount);
    }

    if let Some(amount) = fields.amount {
        body.insert(String::from("amount"), Value::Number(amount));
    }
    if let Some(duration) = fields.duration {
        body.insert(String::from("duration"), Value::Number(duration));
    }
    if let Some(payment_amount) = fields.payment_amount.filter(|_| !keep_base_payment) {
        body.insert(String::from("paymentAmount"), Value::String(payment_amount));
    }
    match kind {
        MachineKind::Washer => {
            if let Some(mode) = fields.mode {
                body.insert(String::from("mode"), Value::String(mode));
            }
            body.remove("temperature");
        }
        MachineKind::Dryer => {
            if let Some(temperature) = fields.temperature {
                body.insert(String::from("temperature"), Value::String(temperature));
            }
            body.remove("mode");
        }
    }

    ProbeBody(body)
}
