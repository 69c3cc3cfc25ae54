//! Core events emitted by the engine

use ticker_api::AuthPhase;
use ticker_util::{MeetingId, SessionId};

use crate::HandshakeTicket;

/// Events from the core engine.
///
/// Some are notifications for clients; `TokenExchangeRequested` and
/// `HandshakeRequested` ask the service loop to start external work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Open this URL to authorize
    AuthorizationRequested { auth_url: String },

    /// Exchange this session id for a bearer token
    TokenExchangeRequested { session_id: SessionId },

    /// Run the meeting handshake
    HandshakeRequested { ticket: HandshakeTicket },

    PhaseChanged { from: AuthPhase, to: AuthPhase },

    /// Linked to a meeting other than the previous one (or the first)
    MeetingChanged {
        previous: Option<MeetingId>,
        current: MeetingId,
    },

    /// Accumulation was zeroed because the meeting changed
    AccumulationReset { discarded_person_seconds: u64 },

    ParticipantCountChanged { count: u32 },

    PollingHalted { consecutive_errors: u32 },

    TrackingStarted { meeting_id: MeetingId },

    TrackingStopped { total_person_seconds: u64 },
}
