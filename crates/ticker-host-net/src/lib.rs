//! Network-backed services for tickerd
//!
//! Provides:
//! - OAuth token exchange over HTTP
//! - Participant counts over HTTP, or a simulated source for demos
//! - The panel bridge: a meeting host fed by the add-on panel over IPC

mod auth;
mod count;
mod http;
mod panel;

pub use auth::*;
pub use count::*;
pub use http::build_client;
pub use panel::*;

#[cfg(test)]
mod test_server;
