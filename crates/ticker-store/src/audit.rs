//! Audit event types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use ticker_api::ErrorKind;
use ticker_util::MeetingId;

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Token exchange succeeded
    AuthorizationSucceeded,

    /// Token exchange or authorization failed
    AuthorizationFailed { reason: String },

    /// Handshake linked a meeting
    MeetingLinked { meeting_id: MeetingId },

    /// A different meeting replaced the linked one; accumulation was reset
    MeetingChanged {
        previous: MeetingId,
        current: MeetingId,
        discarded_person_seconds: u64,
    },

    /// Poller gave up after consecutive errors
    PollingHalted {
        meeting_id: Option<MeetingId>,
        consecutive_errors: u32,
        last_error: Option<ErrorKind>,
    },

    TrackingStarted { meeting_id: MeetingId },

    TrackingStopped {
        meeting_id: Option<MeetingId>,
        total_person_seconds: u64,
    },

    LoggedOut,

    /// Client connected
    ClientConnected { client_id: String, uid: Option<u32> },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: ticker_util::now(),
            event,
        }
    }
}
