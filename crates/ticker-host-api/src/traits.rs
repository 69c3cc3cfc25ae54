//! External service traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use ticker_api::ErrorKind;
use ticker_util::{AccessToken, CloudProjectNumber, MeetingId, SessionId};

/// Errors from external service operations
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HostError {
    /// Map an HTTP status and server-supplied message to an error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => HostError::BadRequest(message),
            401 => HostError::Unauthorized(message),
            403 => HostError::Forbidden(message),
            404 => HostError::NotFound(message),
            _ => HostError::Http { status, message },
        }
    }

    /// How a failed participant-count request is reported
    pub fn poll_error_kind(&self) -> ErrorKind {
        match self {
            HostError::Unauthorized(_) => ErrorKind::AuthExpired,
            HostError::Forbidden(_) => ErrorKind::PermissionDenied,
            HostError::NotFound(_) => ErrorKind::MeetingNotFound,
            _ => ErrorKind::Transient,
        }
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Result of a token exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    /// Lifetime in seconds, if the backend reported one
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Meeting identity reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingInfo {
    #[serde(rename = "meetingId")]
    pub meeting_id: MeetingId,
}

/// OAuth token endpoint
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange the session id delivered by the authorization callback for a bearer token
    async fn exchange_token(&self, session_id: &SessionId) -> HostResult<TokenGrant>;
}

/// Participant-count endpoint (real or simulated)
#[async_trait]
pub trait CountService: Send + Sync {
    /// Current number of participants in `meeting_id`
    async fn participant_count(
        &self,
        token: &AccessToken,
        meeting_id: &MeetingId,
    ) -> HostResult<u32>;

    /// Optional: check if the service is healthy
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Conferencing host that yields the meeting identity
#[async_trait]
pub trait MeetingHost: Send + Sync {
    /// Wait up to `timeout` for the host to become ready. Returns false on timeout.
    async fn wait_ready(&self, timeout: Duration) -> bool;

    /// Whether the host is reachable at all, even if not fully ready
    fn is_available(&self) -> bool;

    /// Base64 `meet_sdk` launch parameter, if one was supplied
    fn launch_parameter(&self) -> Option<String>;

    /// Create a host session for `project` and read the meeting identity
    async fn meeting_info(&self, project: &CloudProjectNumber) -> HostResult<MeetingInfo>;
}
