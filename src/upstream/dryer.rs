use super::classify::classify_dryer;
use super::client::UpstreamClient;
use super::ProbeError;
use crate::config::UpstreamSettings;
use crate::machine::MachineStatus;
use log::debug;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryerStatusRequest<'a> {
    pub machine_no: &'a str,
    pub operator_id: &'a str,
}

/// Asks the dryer status endpoint for a machine's token and classifies it.
///
/// Without an endpoint, operator id or machine number there is nothing to
/// ask, and the dryer is reported as `Unknown`.
pub async fn probe_dryer(
    client: &UpstreamClient,
    settings: &UpstreamSettings,
    operator_id: Option<&str>,
    machine_no: &str,
) -> Result<MachineStatus, ProbeError> {
    let (endpoint, operator_id) = match (
        settings.dryer_status_endpoint.as_deref(),
        operator_id.filter(|id| !id.is_empty()),
    ) {
        (Some(endpoint), Some(operator_id)) if !machine_no.is_empty() => (endpoint, operator_id),
        _ => {
            debug!(
                "Not probing dryer {}, status endpoint or operator id missing",
                machine_no
            );
            return Ok(MachineStatus::Unknown);
        }
    };

    let mut request = client.http_client.post(endpoint).json(&DryerStatusRequest {
        machine_no,
        operator_id,
    });
    if let Some(timeout) = settings.timeout {
        request = request.timeout(timeout);
    }

    let res = request.send().await?;
    let status = res.status();
    if !status.is_success() {
        debug!("Dryer status endpoint answered {} for {}", status, machine_no);
        return Ok(MachineStatus::Unknown);
    }
    let text = res.text().await?;
    debug!(
        "Dryer status endpoint answered {} for {}: {}",
        status,
        machine_no,
        text.chars().take(400).collect::<String>()
    );

    Ok(classify_dryer(status, &text))
}
