//! Transport adapters
//!
//! Both adapters normalize their wire into conversation [`Event`]s; neither
//! touches conversation state directly.
//!
//! [`Event`]: crate::state_machine::Event

pub mod http;
// Driven through the `peer` traits by an embedding WebRTC stack; this
// binary ships none, so only `runtime::VoiceRuntime` tests build a session.
#[allow(dead_code)]
pub mod peer;
#[allow(dead_code)]
pub mod realtime;

#[cfg(test)]
pub mod testing;

pub use http::HttpStreamTransport;
#[allow(unused_imports)] // Realtime adapter surface
pub use peer::{HttpSignaling, PeerError};
#[allow(unused_imports)]
pub use realtime::{RealtimeSession, SessionConfig, SessionPhase};
