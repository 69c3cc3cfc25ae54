//! Error types for meet-ticker

use thiserror::Error;

/// Core error type for meet-ticker operations
#[derive(Debug, Error)]
pub enum TickerError {
    #[error("Cannot {action} while {phase}")]
    InvalidTransition { phase: String, action: String },

    #[error("No meeting linked")]
    NoMeetingLinked,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Host error: {0}")]
    HostError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TickerError {
    pub fn invalid_transition(phase: impl ToString, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            phase: phase.to_string(),
            action: action.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::HostError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TickerError>;
