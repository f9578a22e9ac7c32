//! Trait abstractions for runtime I/O
//!
//! The executor only talks to the network through these, so tests can drive
//! it with scripted transports.

use crate::message::Message;
use crate::state_machine::Event;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Carries one request to the proxy and reports the outcome as events
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `history` and stream the response back into `events`.
    ///
    /// Every event must carry `request_id`. Exactly one terminal event
    /// (`Complete` or `TransportError`) is sent unless `cancel` fires first,
    /// in which case the transport stops without emitting anything more.
    async fn send(
        &self,
        request_id: String,
        history: Vec<Message>,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    );
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send(
        &self,
        request_id: String,
        history: Vec<Message>,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) {
        (**self).send(request_id, history, events, cancel).await;
    }
}
