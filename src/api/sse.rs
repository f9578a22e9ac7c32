//! Server-Sent Events encoding of [`StreamEvent`]s

use crate::wire::StreamEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Relay events from a producer task until it drops its sender
pub fn event_stream(
    rx: mpsc::Receiver<StreamEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = ReceiverStream::new(rx).map(|event| Ok(to_axum(&event)));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn to_axum(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, event = event.name(), "Failed to encode stream event");
            Event::default()
                .event("error")
                .data(r#"{"type":"error","message":"Internal error"}"#)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse_codec::SseDecoder;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_events_decode_on_the_client_side() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StreamEvent::fragment("Hello")).await.unwrap();
        tx.send(StreamEvent::Complete).await.unwrap();
        drop(tx);

        let body = axum::body::to_bytes(event_stream(rx).into_response().into_body(), usize::MAX)
            .await
            .unwrap();

        let mut decoder = SseDecoder::new();
        let frames = decoder.push(&body);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("fragment"));
        assert_eq!(
            StreamEvent::from_frame(&frames[0]).unwrap(),
            StreamEvent::fragment("Hello")
        );
        assert_eq!(frames[1].event.as_deref(), Some("complete"));
    }
}
