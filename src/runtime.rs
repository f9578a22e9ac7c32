//! Client-side conversation runtime
//!
//! Owns one conversation: applies reducer output to the message list,
//! launches transport requests, and tears them down on cancel. The voice
//! runtime does the same for a realtime session.

mod conversation;
mod executor;
pub mod traits;
// Needs a WebRTC stack behind the `transport::peer` traits; this binary
// ships none.
#[allow(dead_code)]
mod voice;

#[cfg(test)]
pub mod testing;

pub use conversation::Conversation;
pub use executor::{ConversationRuntime, Update};
pub use traits::ChatTransport;
#[allow(unused_imports)]
pub use voice::VoiceRuntime;
