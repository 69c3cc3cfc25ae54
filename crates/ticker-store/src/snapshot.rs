//! Persisted meeting state
//!
//! The JSON shape matches what earlier clients wrote under
//! [`SNAPSHOT_KEY`], so existing state keeps loading. Decoding is lenient:
//! a field that is missing or has the wrong type falls back to its default
//! instead of failing the whole snapshot.

use chrono::{DateTime, Local, TimeZone};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use ticker_util::{AccessToken, MeetingId, SessionId};

/// Storage key the snapshot lives under
pub const SNAPSHOT_KEY: &str = "meetTicker_meetingState";

/// Serialized projection of session, meeting and accumulation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSnapshot {
    #[serde(deserialize_with = "lenient")]
    pub session_id: Option<SessionId>,

    #[serde(deserialize_with = "lenient")]
    pub access_token: Option<AccessToken>,

    #[serde(deserialize_with = "lenient")]
    pub is_authenticated: bool,

    #[serde(deserialize_with = "lenient")]
    pub is_tracking: bool,

    /// Milliseconds since the Unix epoch
    #[serde(rename = "startTime", deserialize_with = "lenient")]
    pub start_time_ms: Option<i64>,

    #[serde(deserialize_with = "lenient")]
    pub total_person_seconds: f64,

    #[serde(deserialize_with = "lenient")]
    pub current_participant_count: u32,

    #[serde(rename = "conferenceId", deserialize_with = "lenient")]
    pub meeting_id: Option<MeetingId>,

    /// Milliseconds since the Unix epoch of the latest tick; absent in older snapshots
    #[serde(rename = "lastTickTime", deserialize_with = "lenient")]
    pub last_tick_ms: Option<i64>,
}

impl PersistedSnapshot {
    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time_ms
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
    }

    pub fn set_start_time(&mut self, start: Option<DateTime<Local>>) {
        self.start_time_ms = start.map(|dt| dt.timestamp_millis());
    }

    pub fn last_tick(&self) -> Option<DateTime<Local>> {
        self.last_tick_ms
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
    }

    pub fn set_last_tick(&mut self, last_tick: Option<DateTime<Local>>) {
        self.last_tick_ms = last_tick.map(|dt| dt.timestamp_millis());
    }

    /// Total as a whole number of person-seconds; negative or non-finite values read as zero
    pub fn total_person_seconds(&self) -> u64 {
        if self.total_person_seconds.is_finite() && self.total_person_seconds > 0.0 {
            self.total_person_seconds.round() as u64
        } else {
            0
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}
