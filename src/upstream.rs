use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("UPSTREAM_ENDPOINT is not configured")]
    MissingEndpoint,
    #[error("Reqwest Error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

pub mod checkout;
pub mod classify;
pub mod client;
pub mod dryer;
