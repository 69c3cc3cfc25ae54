//! Shared HTTP plumbing

use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use ticker_host_api::{HostError, HostResult};
use tracing::debug;

/// Error body returned by the backend: `{error, details?}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    details: Option<String>,
}

/// Build an HTTP client whose requests time out after `timeout`
pub fn build_client(timeout: Duration) -> HostResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| HostError::Internal(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn network_error(e: reqwest::Error) -> HostError {
    if e.is_decode() {
        HostError::Decode(e.to_string())
    } else {
        HostError::Network(e.to_string())
    }
}

/// Turn a non-success response into a `HostError`, keeping the server's message
pub(crate) async fn error_from_response(response: Response) -> HostError {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string();

    let message = match response.json::<ErrorBody>().await {
        Ok(ErrorBody {
            error: Some(error),
            details: Some(details),
        }) => format!("{} ({})", error, details),
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        Ok(_) | Err(_) => fallback,
    };

    debug!(status = status.as_u16(), message = %message, "Request failed");
    HostError::from_status(status.as_u16(), message)
}
