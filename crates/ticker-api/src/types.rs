//! Shared types for the tickerd API

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use ticker_util::MeetingId;

/// Authentication and meeting-link phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    MeetingLinked,
    Error,
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthPhase::Unauthenticated => "unauthenticated",
            AuthPhase::Authenticating => "authenticating",
            AuthPhase::Authenticated => "authenticated",
            AuthPhase::MeetingLinked => "meeting_linked",
            AuthPhase::Error => "error",
        };
        f.write_str(name)
    }
}

/// Which screen a client should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    Auth,
    Ticker,
    Error,
}

/// Unit the accumulated total is displayed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostUnit {
    PersonSeconds,
    PersonMinutes,
    PersonHours,
}

impl CostUnit {
    pub fn label(&self) -> &'static str {
        match self {
            CostUnit::PersonSeconds => "person-seconds",
            CostUnit::PersonMinutes => "person-minutes",
            CostUnit::PersonHours => "person-hours",
        }
    }
}

impl fmt::Display for CostUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unit-scaled accumulated total, rounded to the nearest integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostDisplay {
    pub value: u64,
    pub unit: CostUnit,
}

/// Classified failure of an operation against an external collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CredentialsMissing,
    AuthExpired,
    PermissionDenied,
    MeetingNotFound,
    Transient,
    HandshakeTimeout,
    HandshakeFailed,
    TokenExchangeFailed,
    PersistenceFailure,
}

impl ErrorKind {
    /// Errors that move the whole application to the error screen
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::HandshakeTimeout | ErrorKind::HandshakeFailed | ErrorKind::TokenExchangeFailed
        )
    }
}

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Status line shown under the ticker or the auth prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn new(level: StatusLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(StatusLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(StatusLevel::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(StatusLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(StatusLevel::Error, text)
    }
}

/// Everything a client needs to draw the current screen.
///
/// Produced by a pure projection of service state; clients never compute
/// any of these strings themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerView {
    pub mode: PresentationMode,
    pub phase: AuthPhase,
    pub status: Option<StatusMessage>,
    /// Set only in `PresentationMode::Error`
    pub error_message: Option<String>,
    /// Cost value with thousands separators, e.g. `1,234`
    pub cost_value: String,
    pub cost_unit: CostUnit,
    /// `1 participant` / `N participants`
    pub participants: String,
    /// `1h 2m 3s`
    pub elapsed: String,
    /// `Active` while ticking, `Stopped` otherwise
    pub meeting_status: String,
    pub meeting_id: Option<MeetingId>,
}

/// Raw state snapshot returned by `get_state` and state-changing commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerStateSnapshot {
    pub api_version: u32,
    pub phase: AuthPhase,
    pub tracking: bool,
    pub meeting_id: Option<MeetingId>,
    pub total_person_seconds: u64,
    pub participant_count: u32,
    pub start_time: Option<DateTime<Local>>,
    pub last_participant_update: Option<DateTime<Local>>,
    pub consecutive_errors: u32,
    pub polling_halted: bool,
    pub last_error: Option<ErrorKind>,
    pub view: TickerView,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub phase: AuthPhase,
    pub tracking: bool,
    pub polling_halted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serialization() {
        let json = serde_json::to_string(&AuthPhase::MeetingLinked).unwrap();
        assert_eq!(json, "\"meeting_linked\"");
        assert_eq!(AuthPhase::MeetingLinked.to_string(), "meeting_linked");
    }

    #[test]
    fn fatal_error_kinds() {
        assert!(ErrorKind::HandshakeTimeout.is_fatal());
        assert!(ErrorKind::TokenExchangeFailed.is_fatal());
        assert!(!ErrorKind::AuthExpired.is_fatal());
        assert!(!ErrorKind::Transient.is_fatal());
    }

    #[test]
    fn cost_unit_labels() {
        assert_eq!(CostUnit::PersonMinutes.to_string(), "person-minutes");
        let json = serde_json::to_string(&CostDisplay {
            value: 3,
            unit: CostUnit::PersonMinutes,
        })
        .unwrap();
        assert!(json.contains("person_minutes"));
    }
}
