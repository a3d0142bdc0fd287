use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::protocol::READY_STATUS_KEY;

/// Connection lifecycle states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,          // No session, nothing in flight
    Connecting,            // Wake/detect/stream-start sequence running
    WaitingForCameraReady, // Session-class camera polling its ready bit
    Streaming,             // Feed flowing, heartbeat active
    Failed,                // Attempt aborted; reported, then reset to Disconnected
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::WaitingForCameraReady => "Waiting For Camera Ready",
            ConnectionState::Streaming => "Streaming",
            ConnectionState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Address/identity bundle for the one configured camera. Built from
/// configuration at startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraEndpoint {
    pub host: String,
    pub control_port: u16,
    pub stream_port: u16,
    pub mac_address: String,
}

impl CameraEndpoint {
    /// Base URL of the HTTP control plane.
    pub fn control_url(&self) -> String {
        format!("http://{}:{}", self.host, self.control_port)
    }
}

/// Camera generation identity derived from the firmware string.
/// Replaced, not mutated, on every successful detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraIdentity {
    pub model_id: String,
    pub model_name: String,
}

impl std::fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.model_name.is_empty() {
            write!(f, "{}", self.model_id)
        } else {
            write!(f, "{} ({})", self.model_name, self.model_id)
        }
    }
}

/// Most recent `/gp/gpControl/status` document. Only the numeric ready
/// indicator is ever inspected; the rest is kept opaque.
#[derive(Debug, Clone)]
pub struct StatusSnapshot(serde_json::Value);

impl StatusSnapshot {
    pub fn new(body: serde_json::Value) -> Self {
        Self(body)
    }

    pub fn ready_level(&self) -> Option<f64> {
        self.0.get("status")?.get(READY_STATUS_KEY)?.as_f64()
    }

    /// Session-class cameras expose the live feed only once this reads >= 1.
    pub fn is_stream_ready(&self) -> bool {
        self.ready_level().is_some_and(|level| level >= 1.0)
    }
}

/// Flags that shape the stream-initialization sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    pub record: bool,
    pub verbose: bool,
}

/// Where the live feed ends up once initiation succeeds. Handed to the
/// external player/recorder; the core never consumes the stream itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// MPEG-TS over UDP on the configured stream port.
    Udp { port: u16 },
    /// Pre-UDP cameras serve an HTTP live playlist instead.
    LegacyPreview { url: String },
}

impl std::fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamTarget::Udp { port } => write!(f, "udp stream on port {}", port),
            StreamTarget::LegacyPreview { url } => write!(f, "legacy preview at {}", url),
        }
    }
}

/// Events published to UI subscribers.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged(ConnectionState),
    Identity(CameraIdentity),
    Error { kind: ErrorKind, message: String },
}
