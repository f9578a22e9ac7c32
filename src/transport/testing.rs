//! Mock media and peer stack for testing the realtime session

use super::peer::{
    AudioSink, DataChannel, MediaDevices, MediaTrack, PeerConnection, PeerConnector, PeerError,
    PeerHandles, Signaling,
};
use super::realtime::{RealtimeSession, SessionConfig};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Normal,
    Fail,
    Stall,
}

// ============================================================================
// Media
// ============================================================================

pub struct MockTrack {
    id: String,
    stopped: AtomicBool,
}

impl MediaTrack for MockTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) -> Result<(), PeerError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockDevices {
    behavior: Behavior,
    tracks: Mutex<Vec<Arc<MockTrack>>>,
    entered: Notify,
}

impl MockDevices {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            tracks: Mutex::new(Vec::new()),
            entered: Notify::new(),
        }
    }

    /// Tracks handed out and not yet stopped
    pub fn live_tracks(&self) -> usize {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.stopped.load(Ordering::SeqCst))
            .count()
    }

    pub async fn entered(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl MediaDevices for MockDevices {
    async fn acquire_microphone(&self) -> Result<Vec<Arc<dyn MediaTrack>>, PeerError> {
        self.entered.notify_one();
        match self.behavior {
            Behavior::Fail => Err(PeerError::Media("permission denied".to_string())),
            Behavior::Stall => std::future::pending().await,
            Behavior::Normal => {
                let track = Arc::new(MockTrack {
                    id: "mic-0".to_string(),
                    stopped: AtomicBool::new(false),
                });
                self.tracks.lock().unwrap().push(track.clone());
                Ok(vec![track as Arc<dyn MediaTrack>])
            }
        }
    }
}

// ============================================================================
// Peer
// ============================================================================

#[derive(Default)]
pub struct MockPeer {
    closed: AtomicBool,
}

impl MockPeer {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn create_offer(&self) -> Result<String, PeerError> {
        Ok("v=0 mock-offer".to_string())
    }

    async fn apply_answer(&self, _answer_sdp: &str) -> Result<(), PeerError> {
        Ok(())
    }

    fn close(&self) -> Result<(), PeerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
    fail_close: AtomicBool,
}

impl MockChannel {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Make `close` fail from now on
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }
}

impl DataChannel for MockChannel {
    fn send(&self, text: &str) -> Result<(), PeerError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn close(&self) -> Result<(), PeerError> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(PeerError::Channel("already closing".to_string()));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSink {
    detached: AtomicBool,
}

impl MockSink {
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

impl AudioSink for MockSink {
    fn detach(&self) -> Result<(), PeerError> {
        self.detached.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockConnector {
    peer: Arc<MockPeer>,
    channel: Arc<MockChannel>,
    sink: Arc<MockSink>,
    opened: AtomicBool,
}

impl MockConnector {
    pub fn was_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn open(&self, _tracks: &[Arc<dyn MediaTrack>]) -> Result<PeerHandles, PeerError> {
        self.opened.store(true, Ordering::SeqCst);
        Ok(PeerHandles {
            peer: self.peer.clone(),
            channel: self.channel.clone(),
            sink: self.sink.clone(),
        })
    }
}

// ============================================================================
// Signaling
// ============================================================================

pub struct MockSignaling {
    behavior: Behavior,
    offers: Mutex<Vec<String>>,
    entered: Notify,
}

impl MockSignaling {
    pub fn offers(&self) -> Vec<String> {
        self.offers.lock().unwrap().clone()
    }

    pub async fn entered(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl Signaling for MockSignaling {
    async fn exchange(&self, offer_sdp: &str) -> Result<String, PeerError> {
        self.offers.lock().unwrap().push(offer_sdp.to_string());
        self.entered.notify_one();
        match self.behavior {
            Behavior::Normal => Ok("v=0 mock-answer".to_string()),
            Behavior::Fail => Err(PeerError::Signaling("status 502".to_string())),
            Behavior::Stall => std::future::pending().await,
        }
    }
}

// ============================================================================
// Rig
// ============================================================================

/// A full set of mocks wired together, with handles kept for assertions
pub struct MockRig {
    pub devices: Arc<MockDevices>,
    pub connector: Arc<MockConnector>,
    pub peer: Arc<MockPeer>,
    pub channel: Arc<MockChannel>,
    pub sink: Arc<MockSink>,
    pub signaling: Arc<MockSignaling>,
}

impl MockRig {
    pub fn new() -> Self {
        Self::build(Behavior::Normal, Behavior::Normal)
    }

    pub fn with_denied_microphone(self) -> Self {
        Self::build(Behavior::Fail, self.signaling.behavior)
    }

    pub fn with_stalled_microphone(self) -> Self {
        Self::build(Behavior::Stall, self.signaling.behavior)
    }

    pub fn with_failing_signaling(self) -> Self {
        Self::build(self.devices.behavior, Behavior::Fail)
    }

    pub fn with_stalled_signaling(self) -> Self {
        Self::build(self.devices.behavior, Behavior::Stall)
    }

    fn build(devices: Behavior, signaling: Behavior) -> Self {
        let peer = Arc::new(MockPeer::default());
        let channel = Arc::new(MockChannel::default());
        let sink = Arc::new(MockSink::default());
        Self {
            devices: Arc::new(MockDevices::new(devices)),
            connector: Arc::new(MockConnector {
                peer: peer.clone(),
                channel: channel.clone(),
                sink: sink.clone(),
                opened: AtomicBool::new(false),
            }),
            peer,
            channel,
            sink,
            signaling: Arc::new(MockSignaling {
                behavior: signaling,
                offers: Mutex::new(Vec::new()),
                entered: Notify::new(),
            }),
        }
    }

    pub fn session(&self) -> RealtimeSession {
        RealtimeSession::new(
            self.devices.clone(),
            self.connector.clone(),
            self.signaling.clone(),
            SessionConfig::new("Keep answers short.", "alloy"),
        )
    }

    pub fn assert_fully_released(&self) {
        assert_eq!(self.devices.live_tracks(), 0, "local tracks still live");
        assert!(self.peer.is_closed(), "peer connection not closed");
        assert!(self.channel.is_closed(), "control channel not closed");
        assert!(self.sink.is_detached(), "remote audio still attached");
    }
}

impl Default for MockRig {
    fn default() -> Self {
        Self::new()
    }
}
