//! Protocol types for tickerd IPC
//!
//! This crate defines the stable API between tickerd and clients:
//! - Commands (requests from clients)
//! - Responses
//! - Events (service -> clients)
//! - The presentation view model shared by every client
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
