use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes of the camera control protocol.
///
/// Wake errors are advisory and never abort a connection attempt; detection
/// and stream-start errors do. Heartbeat failures are tolerated up to a
/// configured run length before the session is forced down.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured MAC address could not be normalized to 12 hex digits.
    #[error("invalid MAC address format: {mac:?}")]
    InvalidMacAddress { mac: String },

    /// The wake-on-LAN broadcast could not be sent.
    #[error("wake packet send failed: {0}")]
    WakeSendFailed(#[source] std::io::Error),

    /// Neither control endpoint answered during model detection.
    #[error("camera at {host} is unreachable")]
    Unreachable { host: String },

    /// The camera answered but the body could not be interpreted.
    #[error("malformed camera response: {detail}")]
    MalformedResponse { detail: String },

    /// A stream-initialization command was rejected or lost in transit.
    #[error("stream start command failed: {detail}")]
    StartCommandFailed { detail: String },

    /// The camera never reported stream-ready within the poll budget.
    #[error("camera not ready after {attempts} status polls")]
    ReadyPollFailed { attempts: u32 },

    /// The firmware string classified into a model this client cannot drive.
    #[error("unsupported camera model: {model_id}")]
    UnsupportedModel { model_id: String },

    /// A keep-alive datagram could not be sent.
    #[error("keep-alive send failed ({consecutive} in a row): {source}")]
    HeartbeatSendFailed {
        consecutive: u32,
        #[source]
        source: std::io::Error,
    },

    /// The per-session UDP socket could not be created.
    #[error("session socket setup failed: {0}")]
    SessionSocket(#[source] std::io::Error),
}

/// Discriminant-only view of [`Error`], surfaced to UI subscribers so event
/// payloads stay cloneable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidMacAddress,
    WakeSendFailed,
    Unreachable,
    MalformedResponse,
    StartCommandFailed,
    ReadyPollFailed,
    UnsupportedModel,
    HeartbeatSendFailed,
    SessionSocket,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidMacAddress { .. } => ErrorKind::InvalidMacAddress,
            Error::WakeSendFailed(_) => ErrorKind::WakeSendFailed,
            Error::Unreachable { .. } => ErrorKind::Unreachable,
            Error::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Error::StartCommandFailed { .. } => ErrorKind::StartCommandFailed,
            Error::ReadyPollFailed { .. } => ErrorKind::ReadyPollFailed,
            Error::UnsupportedModel { .. } => ErrorKind::UnsupportedModel,
            Error::HeartbeatSendFailed { .. } => ErrorKind::HeartbeatSendFailed,
            Error::SessionSocket(_) => ErrorKind::SessionSocket,
        }
    }

    /// Wake failures are logged and reported but never abort the attempt.
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            Error::WakeSendFailed(_) | Error::InvalidMacAddress { .. }
        )
    }
}
