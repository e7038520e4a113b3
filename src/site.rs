use crate::config::{parse_json_env, EnvSource};
use crate::machine::sanitize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiFlags {
    pub show_location: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostelSummary {
    pub id: String,
    pub name: String,
}

/// Everything the dashboard needs to render a site.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub title: String,
    pub location: String,
    pub ui: UiFlags,
    pub machines: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostels: Option<Vec<HostelSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_hostel: Option<String>,
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn object(value: Option<Value>) -> Option<Value> {
    value.filter(Value::is_object)
}

/// Builds the single-site configuration from the flat `PUBLIC_*` variables.
fn flat_config(env: &dyn EnvSource) -> SiteConfig {
    let machines = match parse_json_env(env, "PUBLIC_MACHINES_JSON") {
        Some(Value::Array(machines)) => machines,
        _ => Vec::new(),
    };
    SiteConfig {
        title: env
            .get("PUBLIC_TITLE")
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| String::from("Laundry Status")),
        location: env.get("PUBLIC_LOCATION").unwrap_or_default(),
        ui: UiFlags {
            show_location: env
                .get("PUBLIC_UI_SHOW_LOCATION")
                .map(|flag| !flag.trim().eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        },
        machines,
        defaults: object(parse_json_env(env, "PUBLIC_DEFAULTS_JSON")),
        hostels: None,
        selected_hostel: None,
    }
}

/// Sites from `PUBLIC_SITES_JSON`, keyed by their sanitized id.
fn sites(env: &dyn EnvSource) -> Vec<(String, Value)> {
    match parse_json_env(env, "PUBLIC_SITES_JSON") {
        Some(Value::Array(sites)) => sites
            .into_iter()
            .filter(Value::is_object)
            .map(|site| (sanitize(site.get("id").unwrap_or(&Value::Null), 64), site))
            .filter(|(id, _)| !id.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolves the configuration for `hostel`, or for the only/first site.
pub fn site_config(env: &dyn EnvSource, hostel: Option<&str>) -> SiteConfig {
    let flat = flat_config(env);
    let sites = sites(env);
    if sites.is_empty() {
        return flat;
    }

    let hostels = sites
        .iter()
        .map(|(id, site)| HostelSummary {
            id: id.clone(),
            name: text(site.get("name"))
                .or_else(|| text(site.get("title")))
                .unwrap_or_else(|| id.clone()),
        })
        .collect();
    let (id, site) = hostel
        .and_then(|wanted| sites.iter().find(|(id, _)| id == wanted))
        .unwrap_or(&sites[0]);

    SiteConfig {
        title: text(site.get("title")).unwrap_or(flat.title),
        location: text(site.get("location")).unwrap_or(flat.location),
        ui: UiFlags {
            show_location: site
                .get("showLocation")
                .and_then(Value::as_bool)
                .unwrap_or(flat.ui.show_location),
        },
        machines: match site.get("machines") {
            Some(Value::Array(machines)) => machines.clone(),
            _ => flat.machines,
        },
        defaults: object(site.get("defaults").cloned()).or(flat.defaults),
        hostels: Some(hostels),
        selected_hostel: Some(id.clone()),
    }
}
