//! Ticker engine for tickerd
//!
//! This crate is the heart of tickerd, containing:
//! - Session state machine (Unauthenticated -> Authenticating -> Authenticated -> MeetingLinked, plus Error)
//! - The 1-second ticker and person-seconds accumulation
//! - Participant polling with bounded retries and a pluggable backoff policy
//! - Meeting handshake with a bounded readiness wait
//! - Snapshot persistence and the pure view projection

mod accumulation;
mod backoff;
mod engine;
mod events;
mod handshake;
mod persist;
mod poller;
mod session;
mod ticker;
mod view;

pub use accumulation::*;
pub use backoff::*;
pub use engine::*;
pub use events::*;
pub use handshake::*;
pub use persist::*;
pub use poller::*;
pub use session::*;
pub use ticker::*;
pub use view::*;
