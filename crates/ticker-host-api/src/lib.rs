//! External service interfaces for tickerd
//!
//! This crate defines the interface between the ticker core and the
//! services it depends on: the OAuth token endpoint, the participant-count
//! endpoint, and the conferencing host that supplies the meeting identity.
//! It contains no network code itself.

mod launch;
mod mock;
mod traits;

pub use launch::*;
pub use mock::*;
pub use traits::*;
