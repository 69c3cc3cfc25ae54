//! Validated configuration ready for use by the service

use crate::schema::{
    RawBackoff, RawConfig, RawCountSourceConfig, RawCountSourceMode, RawHandshakeConfig,
    RawPollingConfig, RawServiceConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_AUTH_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_PARTICIPANTS_PATH: &str = "/participants";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_SIMULATED_MIN: u32 = 2;
pub const DEFAULT_SIMULATED_MAX: u32 = 9;

pub const POLL_INTERVAL_RANGE_SECS: (u64, u64) = (5, 300);
pub const MAX_RETRIES_RANGE: (u32, u32) = (1, 10);
pub const RETRY_DELAY_RANGE_MS: (u64, u64) = (1000, 30_000);

/// Validated configuration
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub service: ServiceConfig,
    pub polling: PollingPolicy,
    pub handshake: HandshakePolicy,
    pub count_source: CountSourcePolicy,
}

impl Policy {
    /// Convert from raw config (after validation), clamping tunables
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            polling: PollingPolicy::from_raw(raw.polling),
            handshake: HandshakePolicy::from_raw(raw.handshake),
            count_source: CountSourcePolicy::from_raw(raw.count_source),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    pub auth_base_url: String,
    pub participants_path: String,
    pub request_timeout: Duration,
    pub meet_sdk: Option<String>,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw
                .socket_path
                .unwrap_or_else(ticker_util::socket_path_without_env),
            data_dir: raw
                .data_dir
                .unwrap_or_else(ticker_util::data_dir_without_env),
            auth_base_url: raw
                .auth_base_url
                .unwrap_or_else(|| DEFAULT_AUTH_BASE_URL.to_string()),
            participants_path: raw
                .participants_path
                .unwrap_or_else(|| DEFAULT_PARTICIPANTS_PATH.to_string()),
            request_timeout: Duration::from_secs(
                raw.request_timeout_seconds
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            meet_sdk: raw.meet_sdk,
        }
    }

    /// URL the user opens to start authorization
    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.auth_base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.auth_base_url)
    }

    pub fn participants_url(&self) -> String {
        format!("{}{}", self.auth_base_url, self.participants_path)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// How the poll delay grows with consecutive errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// Participant polling policy
#[derive(Debug, Clone)]
pub struct PollingPolicy {
    pub interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub backoff: BackoffKind,
}

impl PollingPolicy {
    fn from_raw(raw: RawPollingConfig) -> Self {
        let interval_secs = clamp_setting(
            "polling.interval_seconds",
            raw.interval_seconds.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            POLL_INTERVAL_RANGE_SECS,
        );
        let max_retries = clamp_setting(
            "polling.max_retries",
            raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            MAX_RETRIES_RANGE,
        );
        let retry_delay_ms = clamp_setting(
            "polling.retry_delay_ms",
            raw.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
            RETRY_DELAY_RANGE_MS,
        );

        Self {
            interval: Duration::from_secs(interval_secs),
            max_retries,
            retry_delay: Duration::from_millis(retry_delay_ms),
            backoff: match raw.backoff {
                Some(RawBackoff::Exponential) => BackoffKind::Exponential,
                Some(RawBackoff::Fixed) | None => BackoffKind::Fixed,
            },
        }
    }
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self::from_raw(RawPollingConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct HandshakePolicy {
    /// Bounded wait for the meeting host to become ready
    pub timeout: Duration,
}

impl HandshakePolicy {
    fn from_raw(raw: RawHandshakeConfig) -> Self {
        Self {
            timeout: Duration::from_millis(raw.timeout_ms.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT_MS)),
        }
    }
}

impl Default for HandshakePolicy {
    fn default() -> Self {
        Self::from_raw(RawHandshakeConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountSourceMode {
    Http,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct CountSourcePolicy {
    pub mode: CountSourceMode,
    pub simulated_min: u32,
    pub simulated_max: u32,
}

impl CountSourcePolicy {
    fn from_raw(raw: RawCountSourceConfig) -> Self {
        Self {
            mode: match raw.mode {
                Some(RawCountSourceMode::Simulated) => CountSourceMode::Simulated,
                Some(RawCountSourceMode::Http) | None => CountSourceMode::Http,
            },
            simulated_min: raw.simulated_min.unwrap_or(DEFAULT_SIMULATED_MIN),
            simulated_max: raw.simulated_max.unwrap_or(DEFAULT_SIMULATED_MAX),
        }
    }
}

impl Default for CountSourcePolicy {
    fn default() -> Self {
        Self::from_raw(RawCountSourceConfig::default())
    }
}

/// Clamp `value` into `min..=max`, logging when it had to move.
fn clamp_setting<T>(name: &str, value: T, (min, max): (T, T)) -> T
where
    T: Ord + Copy + std::fmt::Display,
{
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!(
            setting = name,
            configured = %value,
            applied = %clamped,
            "Configuration value out of range, clamped"
        );
    }
    clamped
}
