//! Seams around the media and peer-connection stack
//!
//! The realtime session only sees these traits, so negotiation and teardown
//! can be exercised without audio hardware or a WebRTC implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("Microphone unavailable: {0}")]
    Media(String),
    #[error("Peer connection failed: {0}")]
    Connection(String),
    #[error("Session negotiation failed: {0}")]
    Signaling(String),
    #[error("Control channel error: {0}")]
    Channel(String),
    #[error("A session is already active")]
    AlreadyActive,
    #[error("Session was hung up")]
    Cancelled,
}

/// A local capture track
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;
    fn stop(&self) -> Result<(), PeerError>;
}

/// Grants access to local capture devices
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn acquire_microphone(&self) -> Result<Vec<Arc<dyn MediaTrack>>, PeerError>;
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<String, PeerError>;
    async fn apply_answer(&self, answer_sdp: &str) -> Result<(), PeerError>;
    fn close(&self) -> Result<(), PeerError>;
}

/// Control-event channel alongside the audio
pub trait DataChannel: Send + Sync {
    fn send(&self, text: &str) -> Result<(), PeerError>;
    fn close(&self) -> Result<(), PeerError>;
}

/// Where remote audio is played
pub trait AudioSink: Send + Sync {
    fn detach(&self) -> Result<(), PeerError>;
}

/// Everything a freshly opened peer hands back
pub struct PeerHandles {
    pub peer: Arc<dyn PeerConnection>,
    pub channel: Arc<dyn DataChannel>,
    pub sink: Arc<dyn AudioSink>,
}

/// Opens a peer connection carrying the given local tracks
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn open(&self, tracks: &[Arc<dyn MediaTrack>]) -> Result<PeerHandles, PeerError>;
}

/// Offer/answer exchange with the remote endpoint
#[async_trait]
pub trait Signaling: Send + Sync {
    async fn exchange(&self, offer_sdp: &str) -> Result<String, PeerError>;
}

/// Peer connection state as reported by the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// States after which the session cannot continue
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed | ConnectionState::Closed
        )
    }
}

// ============================================================================
// HTTP Signaling
// ============================================================================

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Posts the offer to the proxy's realtime session endpoint
pub struct HttpSignaling {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSignaling {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Signaling for HttpSignaling {
    async fn exchange(&self, offer_sdp: &str) -> Result<String, PeerError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(|e| PeerError::Signaling(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map_or_else(|_| format!("status {status}"), |body| body.error);
            return Err(PeerError::Signaling(message));
        }

        response
            .text()
            .await
            .map_err(|e| PeerError::Signaling(e.to_string()))
    }
}
