//! Meeting handshake orchestration

use std::time::Duration;
use thiserror::Error;
use ticker_api::ErrorKind;
use ticker_host_api::{MeetingHost, decode_cloud_project};
use ticker_util::MeetingId;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("Meet add-ons SDK not ready after {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    #[error("{0}")]
    Failed(String),
}

impl HandshakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandshakeError::Timeout { .. } => ErrorKind::HandshakeTimeout,
            HandshakeError::Failed(_) => ErrorKind::HandshakeFailed,
        }
    }
}

pub type HandshakeResult<T> = Result<T, HandshakeError>;

/// Identity of one handshake attempt; results from older attempts are dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeTicket {
    pub generation: u64,
}

/// Obtain the meeting id from the host.
///
/// Waits at most `timeout` for the host to become ready. If it does not,
/// one degraded attempt is made when the host is reachable at all; any
/// failure of that attempt is reported as a timeout.
pub async fn link_meeting(host: &dyn MeetingHost, timeout: Duration) -> HandshakeResult<MeetingId> {
    let waited_ms = timeout.as_millis() as u64;
    let ready = host.wait_ready(timeout).await;

    if !ready {
        if !host.is_available() {
            warn!(waited_ms, "Meeting host unavailable");
            return Err(HandshakeError::Timeout { waited_ms });
        }
        warn!(waited_ms, "Meeting host not ready, trying degraded handshake");
    }

    let result = resolve_meeting(host).await;
    match result {
        Ok(meeting_id) => {
            info!(meeting_id = %meeting_id, degraded = !ready, "Handshake complete");
            Ok(meeting_id)
        }
        Err(e) if !ready => {
            debug!(error = %e, "Degraded handshake failed");
            Err(HandshakeError::Timeout { waited_ms })
        }
        Err(e) => Err(e),
    }
}

async fn resolve_meeting(host: &dyn MeetingHost) -> HandshakeResult<MeetingId> {
    let param = host.launch_parameter().ok_or_else(|| {
        HandshakeError::Failed("Could not determine cloud project number from Meet SDK".into())
    })?;
    let project = decode_cloud_project(&param).map_err(|e| HandshakeError::Failed(e.to_string()))?;

    debug!(project = %project, "Resolved cloud project number");

    let info = host
        .meeting_info(&project)
        .await
        .map_err(|e| HandshakeError::Failed(e.to_string()))?;
    Ok(info.meeting_id)
}
