//! Shared utilities for meet-ticker
//!
//! This crate provides:
//! - ID types (SessionId, AccessToken, MeetingId, CloudProjectNumber, ClientId)
//! - Time utilities (mock-able wall clock, monotonic time, elapsed formatting)
//! - Display helpers for counts and participant labels
//! - Error types
//! - Default paths for socket, config, and data directories

mod display;
mod error;
mod ids;
mod paths;
mod time;

pub use display::*;
pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
