//! Event types for tickerd -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use ticker_util::MeetingId;

use crate::{TickerView, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: ticker_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Fresh view (sent on subscribe, every tick and every state change)
    ViewUpdated(Box<TickerView>),

    /// A client should open the authorization URL
    AuthorizationRequested { auth_url: String },

    /// The linked meeting changed; accumulation was reset if `previous` was set
    MeetingChanged {
        previous: Option<MeetingId>,
        current: MeetingId,
    },

    /// A poll returned a different participant count
    ParticipantCountChanged { count: u32 },

    /// Polling halted after too many consecutive errors
    PollingHalted { consecutive_errors: u32 },

    /// Service is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = Event::new(EventPayload::MeetingChanged {
            previous: Some(MeetingId::new("abc")),
            current: MeetingId::new("xyz"),
        });

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.api_version, API_VERSION);
        match parsed.payload {
            EventPayload::MeetingChanged { previous, current } => {
                assert_eq!(previous, Some(MeetingId::new("abc")));
                assert_eq!(current, MeetingId::new("xyz"));
            }
            other => panic!("Expected MeetingChanged, got {:?}", other),
        }
    }

    #[test]
    fn halted_event_tag() {
        let event = Event::new(EventPayload::PollingHalted {
            consecutive_errors: 3,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"polling_halted\""));
    }
}
