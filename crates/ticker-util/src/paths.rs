//! Default paths for meet-ticker components
//!
//! Paths are user-writable by default:
//! - Socket: `$XDG_RUNTIME_DIR/meet-ticker/tickerd.sock` or `/tmp/meet-ticker-$USER/tickerd.sock`
//! - Config: `$XDG_CONFIG_HOME/meet-ticker/ticker.toml` or `~/.config/meet-ticker/ticker.toml`
//! - Data: `$XDG_DATA_HOME/meet-ticker` or `~/.local/share/meet-ticker`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const TICKER_SOCKET_ENV: &str = "TICKER_SOCKET";

const SOCKET_FILENAME: &str = "tickerd.sock";
const CONFIG_FILENAME: &str = "ticker.toml";
const APP_DIR: &str = "meet-ticker";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$TICKER_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/meet-ticker/tickerd.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/meet-ticker-$USER/tickerd.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(TICKER_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Socket path without consulting `TICKER_SOCKET`.
/// Used for config defaults, where the env var is checked separately by the CLI.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Default data directory: `$XDG_DATA_HOME/meet-ticker`, then `~/.local/share/meet-ticker`.
/// `TICKER_DATA_DIR` is read by the tickerd CLI, not here.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_names_the_app() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("meet-ticker"));
        assert!(path.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("meet-ticker"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }

    #[test]
    fn data_dir_names_the_app() {
        assert!(data_dir_without_env().to_string_lossy().contains("meet-ticker"));
    }
}
