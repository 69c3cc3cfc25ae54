//! Config validation CLI tool
//!
//! Validates a tickerd configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use ticker_config::{BackoffKind, CountSourceMode};
use ticker_util::default_config_path;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a tickerd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match ticker_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", ticker_config::CURRENT_CONFIG_VERSION);
            println!("  Socket: {}", policy.service.socket_path.display());
            println!("  Data dir: {}", policy.service.data_dir.display());
            println!("  Auth URL: {}", policy.service.auth_url());
            println!("  Participants URL: {}", policy.service.participants_url());
            println!(
                "  Polling: every {}s, halt after {} errors, {} backoff ({}ms base)",
                policy.polling.interval.as_secs(),
                policy.polling.max_retries,
                match policy.polling.backoff {
                    BackoffKind::Fixed => "fixed",
                    BackoffKind::Exponential => "exponential",
                },
                policy.polling.retry_delay.as_millis()
            );
            println!(
                "  Handshake timeout: {}ms",
                policy.handshake.timeout.as_millis()
            );
            match policy.count_source.mode {
                CountSourceMode::Http => println!("  Count source: http"),
                CountSourceMode::Simulated => println!(
                    "  Count source: simulated ({}..={})",
                    policy.count_source.simulated_min, policy.count_source.simulated_max
                ),
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ticker_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ticker_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ticker_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ticker_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        ticker_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
