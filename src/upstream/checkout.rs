use super::classify::classify_checkout;
use super::client::UpstreamClient;
use super::ProbeError;
use crate::config::UpstreamSettings;
use crate::machine::MachineStatus;
use crate::probe::ProbeBody;
use chrono::Utc;
use log::{debug, warn};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Appends a `v=<millis>` parameter so no cache between us and the vendor
/// answers for it.
pub fn cache_busted(endpoint: &str, millis: i64) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}v={}", endpoint, separator, millis)
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!("Skipping invalid upstream header {}", name),
    }
}

/// The headers a browser would send when starting a checkout on the vendor's site.
pub fn probe_headers(settings: &UpstreamSettings) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json,text/plain,*/*"),
    );
    if let Some(origin) = &settings.origin {
        insert_header(&mut headers, "Origin", origin);
    }
    if let Some(referer) = &settings.referer {
        insert_header(&mut headers, "Referer", referer);
    }
    if let Some(requested_with) = &settings.x_requested_with {
        insert_header(&mut headers, "X-Requested-With", requested_with);
    }
    for (name, value) in &settings.extra_headers {
        insert_header(&mut headers, name, value);
    }
    headers
}

/// Sends a checkout-initiation probe and classifies the vendor's answer.
///
/// Transport failures are returned as errors, never classified.
pub async fn probe_checkout(
    client: &UpstreamClient,
    settings: &UpstreamSettings,
    body: &ProbeBody,
) -> Result<MachineStatus, ProbeError> {
    let endpoint = settings
        .endpoint
        .as_deref()
        .ok_or(ProbeError::MissingEndpoint)?;

    let mut request = client
        .http_client
        .post(cache_busted(endpoint, Utc::now().timestamp_millis()))
        .headers(probe_headers(settings))
        .json(body);
    if let Some(timeout) = settings.timeout {
        request = request.timeout(timeout);
    }

    let res = request.send().await?;
    let status = res.status();
    let text = res.text().await?;
    debug!(
        "Upstream answered {} for {}: {}",
        status,
        body.machine_no().unwrap_or("?"),
        text.chars().take(400).collect::<String>()
    );

    Ok(classify_checkout(status, &text))
}
