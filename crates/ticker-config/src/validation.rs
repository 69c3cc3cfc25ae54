//! Configuration validation
//!
//! Structural problems are rejected here. Tunables that are merely out of
//! range are clamped later, in [`crate::Policy::from_raw`].

use crate::schema::RawConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}': {message}")]
    InvalidUrl {
        field: String,
        value: String,
        message: String,
    },

    #[error("{field}: {message}")]
    InvalidPath { field: String, message: String },

    #[error("{field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("count_source: simulated_min {min} > simulated_max {max}")]
    InvertedRange { min: u32, max: u32 },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let service = &config.service;

    if let Some(url) = &service.auth_base_url
        && let Err(message) = check_base_url(url)
    {
        errors.push(ValidationError::InvalidUrl {
            field: "service.auth_base_url".into(),
            value: url.clone(),
            message,
        });
    }

    if let Some(path) = &service.participants_path {
        if path.is_empty() {
            errors.push(ValidationError::InvalidPath {
                field: "service.participants_path".into(),
                message: "cannot be empty".into(),
            });
        } else if !path.starts_with('/') {
            errors.push(ValidationError::InvalidPath {
                field: "service.participants_path".into(),
                message: format!("'{}' must start with '/'", path),
            });
        }
    }

    if let Some(socket) = &service.socket_path
        && socket.as_os_str().is_empty()
    {
        errors.push(ValidationError::InvalidPath {
            field: "service.socket_path".into(),
            message: "cannot be empty".into(),
        });
    }

    if let Some(dir) = &service.data_dir
        && dir.as_os_str().is_empty()
    {
        errors.push(ValidationError::InvalidPath {
            field: "service.data_dir".into(),
            message: "cannot be empty".into(),
        });
    }

    if service.request_timeout_seconds == Some(0) {
        errors.push(ValidationError::InvalidValue {
            field: "service.request_timeout_seconds".into(),
            message: "must be greater than zero".into(),
        });
    }

    if config.handshake.timeout_ms == Some(0) {
        errors.push(ValidationError::InvalidValue {
            field: "handshake.timeout_ms".into(),
            message: "must be greater than zero".into(),
        });
    }

    let counts = &config.count_source;
    let min = counts.simulated_min.unwrap_or(crate::DEFAULT_SIMULATED_MIN);
    let max = counts.simulated_max.unwrap_or(crate::DEFAULT_SIMULATED_MAX);
    if min > max {
        errors.push(ValidationError::InvertedRange { min, max });
    }

    errors
}

/// Check that a base URL is `http(s)://host[...]` without a trailing slash
pub fn check_base_url(url: &str) -> Result<(), String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| "scheme must be http or https".to_string())?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err("missing host".into());
    }
    if url.ends_with('/') {
        return Err("must not end with '/'".into());
    }

    Ok(())
}
