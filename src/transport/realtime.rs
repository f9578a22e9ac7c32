//! Realtime voice session
//!
//! Negotiates a peer connection through [`Signaling`], configures the remote
//! voice model over the control channel, and translates inbound control
//! events into conversation events.
//!
//! All acquired resources (local tracks, peer connection, control channel,
//! remote audio sink) are released by one teardown routine that runs on
//! every exit path. Each release is attempted even if an earlier one fails.

use super::peer::{
    AudioSink, ConnectionState, DataChannel, MediaDevices, MediaTrack, PeerConnection,
    PeerConnector, PeerError, Signaling,
};
use crate::message::Role;
use crate::state_machine::Event;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Session lifecycle, independent of the conversation's speech states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Connected,
}

/// Server-side voice activity detection parameters
#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad".to_string(),
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// What the session asks of the remote voice model once the channel opens
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub instructions: String,
    pub voice: String,
    pub transcription_model: String,
    pub turn_detection: TurnDetection,
}

impl SessionConfig {
    pub fn new(instructions: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            voice: voice.into(),
            transcription_model: "whisper-1".to_string(),
            turn_detection: TurnDetection::default(),
        }
    }
}

// ============================================================================
// Control channel wire format
// ============================================================================

#[derive(Serialize)]
#[serde(tag = "type")]
enum OutboundEvent<'a> {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate<'a> },
    #[serde(rename = "response.create")]
    ResponseCreate,
}

#[derive(Serialize)]
struct SessionUpdate<'a> {
    instructions: &'a str,
    voice: &'a str,
    input_audio_transcription: Transcription<'a>,
    turn_detection: &'a TurnDetection,
}

#[derive(Serialize)]
struct Transcription<'a> {
    model: &'a str,
}

#[derive(Deserialize)]
struct InboundEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    error: Option<InboundError>,
}

#[derive(Deserialize)]
struct InboundError {
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Default)]
struct Resources {
    tracks: Vec<Arc<dyn MediaTrack>>,
    peer: Option<Arc<dyn PeerConnection>>,
    channel: Option<Arc<dyn DataChannel>>,
    sink: Option<Arc<dyn AudioSink>>,
}

struct Inner {
    phase: SessionPhase,
    cancel: CancellationToken,
    resources: Resources,
    /// Assistant transcript deltas for the utterance in progress
    transcript: String,
}

pub struct RealtimeSession {
    devices: Arc<dyn MediaDevices>,
    connector: Arc<dyn PeerConnector>,
    signaling: Arc<dyn Signaling>,
    config: SessionConfig,
    inner: Mutex<Inner>,
}

impl RealtimeSession {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        connector: Arc<dyn PeerConnector>,
        signaling: Arc<dyn Signaling>,
        config: SessionConfig,
    ) -> Self {
        Self {
            devices,
            connector,
            signaling,
            config,
            inner: Mutex::new(Inner {
                phase: SessionPhase::Disconnected,
                cancel: CancellationToken::new(),
                resources: Resources::default(),
                transcript: String::new(),
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic elsewhere; the data is still usable
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Negotiate the session. On success the session waits in `Connecting`
    /// for the control channel to open.
    ///
    /// Every step races [`hangup`](Self::hangup); on any failure all
    /// resources acquired so far are released.
    pub async fn connect(&self) -> Result<(), PeerError> {
        let cancel = {
            let mut inner = self.lock();
            if inner.phase != SessionPhase::Disconnected {
                return Err(PeerError::AlreadyActive);
            }
            inner.phase = SessionPhase::Connecting;
            inner.cancel = CancellationToken::new();
            inner.transcript.clear();
            inner.cancel.clone()
        };

        let result = self.negotiate(&cancel).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Realtime negotiation failed");
            self.teardown();
        }
        result
    }

    async fn negotiate(&self, cancel: &CancellationToken) -> Result<(), PeerError> {
        let tracks = race(cancel, self.devices.acquire_microphone()).await?;
        self.lock().resources.tracks.clone_from(&tracks);

        let handles = race(cancel, self.connector.open(&tracks)).await?;
        let peer = handles.peer.clone();
        {
            let mut inner = self.lock();
            inner.resources.peer = Some(handles.peer);
            inner.resources.channel = Some(handles.channel);
            inner.resources.sink = Some(handles.sink);
        }

        let offer = race(cancel, peer.create_offer()).await?;
        let answer = race(cancel, self.signaling.exchange(&offer)).await?;
        race(cancel, peer.apply_answer(&answer)).await?;

        if cancel.is_cancelled() {
            return Err(PeerError::Cancelled);
        }
        tracing::info!("Realtime session negotiated");
        Ok(())
    }

    /// The control channel opened: configure the voice model and ask it for
    /// a greeting.
    pub fn on_channel_open(&self) -> Result<Vec<Event>, PeerError> {
        let channel = {
            let inner = self.lock();
            if inner.phase != SessionPhase::Connecting {
                return Ok(Vec::new());
            }
            inner
                .resources
                .channel
                .clone()
                .ok_or_else(|| PeerError::Channel("channel missing".to_string()))?
        };

        let sent = self.send_initial_events(channel.as_ref());
        if let Err(e) = sent {
            tracing::warn!(error = %e, "Failed to configure realtime session");
            self.teardown();
            return Err(e);
        }

        self.lock().phase = SessionPhase::Connected;
        Ok(vec![Event::SessionConnected])
    }

    fn send_initial_events(&self, channel: &dyn DataChannel) -> Result<(), PeerError> {
        let update = OutboundEvent::SessionUpdate {
            session: SessionUpdate {
                instructions: &self.config.instructions,
                voice: &self.config.voice,
                input_audio_transcription: Transcription {
                    model: &self.config.transcription_model,
                },
                turn_detection: &self.config.turn_detection,
            },
        };
        for event in [update, OutboundEvent::ResponseCreate] {
            let text =
                serde_json::to_string(&event).map_err(|e| PeerError::Channel(e.to_string()))?;
            channel.send(&text)?;
        }
        Ok(())
    }

    /// Translate one inbound control message
    pub fn handle_message(&self, raw: &str) -> Vec<Event> {
        let mut inner = self.lock();
        if inner.phase != SessionPhase::Connected {
            return Vec::new();
        }

        let inbound: InboundEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable realtime event");
                return Vec::new();
            }
        };

        match inbound.kind.as_str() {
            "input_audio_buffer.speech_started" => vec![Event::UserSpeechStarted],
            "input_audio_buffer.speech_stopped" => vec![Event::UserSpeechStopped],

            "response.audio_transcript.delta" | "response.output_audio_transcript.delta" => {
                let delta = inbound.delta.unwrap_or_default();
                let starting = inner.transcript.is_empty();
                inner.transcript.push_str(&delta);
                if starting && !delta.is_empty() {
                    vec![Event::AiSpeechStarted]
                } else {
                    Vec::new()
                }
            }

            "response.audio_transcript.done" | "response.output_audio_transcript.done" => {
                let buffered = std::mem::take(&mut inner.transcript);
                let text = inbound
                    .transcript
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(buffered);
                vec![Event::TurnCommitted {
                    message_id: turn_id(inbound.item_id),
                    role: Role::Assistant,
                    text,
                }]
            }

            "conversation.item.input_audio_transcription.completed" => {
                vec![Event::TurnCommitted {
                    message_id: turn_id(inbound.item_id),
                    role: Role::User,
                    text: inbound.transcript.unwrap_or_default(),
                }]
            }

            "error" => {
                let message = inbound
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "Realtime session error".to_string());
                vec![Event::SessionError { message }]
            }

            other => {
                tracing::trace!(kind = other, "Ignoring realtime event");
                Vec::new()
            }
        }
    }

    /// Peer connection state changed
    pub fn on_connection_state(&self, state: ConnectionState) -> Option<Event> {
        if !state.is_terminal() {
            return None;
        }
        if self.phase() == SessionPhase::Disconnected {
            return None;
        }
        tracing::info!(?state, "Realtime connection ended");
        self.teardown();
        Some(Event::SessionClosed)
    }

    /// End the session from the user's side. Safe at any point, including
    /// while [`connect`](Self::connect) is still negotiating.
    pub fn hangup(&self) -> Event {
        self.lock().cancel.cancel();
        self.teardown();
        Event::SessionClosed
    }

    /// Release everything acquired so far. Idempotent.
    fn teardown(&self) {
        let resources = {
            let mut inner = self.lock();
            inner.phase = SessionPhase::Disconnected;
            inner.transcript.clear();
            inner.cancel.cancel();
            std::mem::take(&mut inner.resources)
        };

        if let Some(channel) = resources.channel {
            if let Err(e) = channel.close() {
                tracing::warn!(error = %e, "Failed to close control channel");
            }
        }
        if let Some(peer) = resources.peer {
            if let Err(e) = peer.close() {
                tracing::warn!(error = %e, "Failed to close peer connection");
            }
        }
        for track in resources.tracks {
            if let Err(e) = track.stop() {
                tracing::warn!(track = track.id(), error = %e, "Failed to stop local track");
            }
        }
        if let Some(sink) = resources.sink {
            if let Err(e) = sink.detach() {
                tracing::warn!(error = %e, "Failed to detach remote audio");
            }
        }
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn race<T>(
    cancel: &CancellationToken,
    step: impl Future<Output = Result<T, PeerError>>,
) -> Result<T, PeerError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PeerError::Cancelled),
        result = step => result,
    }
}

fn turn_id(item_id: Option<String>) -> String {
    item_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
