//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Participant polling settings
    #[serde(default)]
    pub polling: RawPollingConfig,

    /// Meeting handshake settings
    #[serde(default)]
    pub handshake: RawHandshakeConfig,

    /// Where participant counts come from
    #[serde(default)]
    pub count_source: RawCountSourceConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Base URL of the auth/participants backend (e.g. `http://localhost:3000`)
    pub auth_base_url: Option<String>,

    /// Path of the participant-count endpoint, relative to `auth_base_url`
    pub participants_path: Option<String>,

    /// Timeout for each HTTP request
    pub request_timeout_seconds: Option<u64>,

    /// Launch parameter to use when the panel does not supply one
    pub meet_sdk: Option<String>,
}

/// Participant polling settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPollingConfig {
    pub interval_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub backoff: Option<RawBackoff>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawBackoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawHandshakeConfig {
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCountSourceConfig {
    pub mode: Option<RawCountSourceMode>,
    pub simulated_min: Option<u32>,
    pub simulated_max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawCountSourceMode {
    Http,
    Simulated,
}
