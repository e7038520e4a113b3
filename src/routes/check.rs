use super::{error_response, iso_now, json_response};
use crate::config::{dryer_operator_id, EnvSource, KindDefaults, SharedEnv, UpstreamSettings};
use crate::machine::{sanitize, MachineDescriptor, MachineKind, MachineStatus};
use crate::probe::base::resolve_base;
use crate::probe::{build_probe, ProbePatch};
use crate::upstream::checkout::probe_checkout;
use crate::upstream::client::UpstreamClient;
use crate::upstream::dryer::probe_dryer;
use crate::upstream::ProbeError;
use axum::body::Bytes;
use axum::extract::Extension;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;

/// Only this many machines are probed per request.
pub const MAX_MACHINES: usize = 20;

#[derive(Debug, Serialize)]
pub struct MachineResult {
    pub id: String,
    pub status: MachineStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub checked_at: String,
    pub machines: Vec<MachineResult>,
}

/// What a single request asks for, shared by every machine in it.
struct CheckContext<'a> {
    env: &'a dyn EnvSource,
    client: &'a UpstreamClient,
    settings: UpstreamSettings,
    hostel: Option<String>,
    site_defaults: ProbePatch,
}

async fn check_machine(
    ctx: &CheckContext<'_>,
    machine: &MachineDescriptor,
) -> Result<MachineStatus, ProbeError> {
    let kind = machine.kind();
    let hostel = ctx.hostel.as_deref();
    let defaults = match kind {
        MachineKind::Washer => KindDefaults::washer(ctx.env),
        MachineKind::Dryer => KindDefaults::dryer(ctx.env),
    };
    let body = build_probe(
        resolve_base(ctx.env, kind, hostel),
        machine,
        kind,
        &defaults,
        &[ctx.site_defaults.clone(), ProbePatch::from_machine(machine)],
        &iso_now(),
    );
    debug!(
        "Probing {} ({:?}) with {}",
        machine.result_id(),
        kind,
        serde_json::to_string(&body).unwrap_or_default()
    );

    match kind {
        MachineKind::Washer => probe_checkout(ctx.client, &ctx.settings, &body).await,
        MachineKind::Dryer => {
            let operator_id = dryer_operator_id(ctx.env, hostel);
            probe_dryer(
                ctx.client,
                &ctx.settings,
                operator_id.as_deref(),
                &machine.machine_no,
            )
            .await
        }
    }
}

// POST /api/check
pub async fn handle(
    method: Method,
    Extension(env): Extension<SharedEnv>,
    Extension(client): Extension<UpstreamClient>,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "POST only");
    }

    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejecting check request, body is not valid JSON: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let list = match payload.get("machines").and_then(Value::as_array) {
        Some(list) if !list.is_empty() => list,
        _ => {
            warn!("Rejecting check request, no machines provided");
            return error_response(StatusCode::BAD_REQUEST, "machines[] required");
        }
    };

    let targets: Vec<MachineDescriptor> = list
        .iter()
        .take(MAX_MACHINES)
        .map(MachineDescriptor::from_json)
        .filter(|machine| !machine.machine_no.is_empty())
        .collect();

    let ctx = CheckContext {
        env: env.as_ref(),
        client: &client,
        settings: UpstreamSettings::from_env(env.as_ref()),
        hostel: payload
            .get("hostel")
            .map(|hostel| sanitize(hostel, 64))
            .filter(|hostel| !hostel.is_empty()),
        site_defaults: payload
            .get("defaults")
            .map(ProbePatch::from_json)
            .unwrap_or_default(),
    };
    debug!(
        "Checking {} of {} machines{}: {}",
        targets.len(),
        list.len(),
        ctx.hostel
            .as_deref()
            .map(|hostel| format!(" in {}", hostel))
            .unwrap_or_default(),
        targets.iter().map(MachineDescriptor::result_id).join(", ")
    );

    let mut machines = Vec::with_capacity(targets.len());
    for machine in &targets {
        let status = match check_machine(&ctx, machine).await {
            Ok(status) => status,
            Err(e) => {
                error!("Error checking machine {}: {}", machine.result_id(), e);
                MachineStatus::Error
            }
        };
        info!(
            "Machine {}{} is {:?}",
            machine.result_id(),
            machine
                .label
                .as_deref()
                .map(|label| format!(" ({})", label))
                .unwrap_or_default(),
            status
        );
        machines.push(MachineResult {
            id: machine.result_id().to_string(),
            status,
        });
    }

    json_response(
        StatusCode::OK,
        CheckResponse {
            checked_at: iso_now(),
            machines,
        },
    )
}
