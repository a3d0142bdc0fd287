pub mod detect;
pub mod heartbeat;
pub mod stream;
pub mod wake;

// Wire constants shared across the protocol modules

/// UDP port the wake-on-LAN magic packet is broadcast to.
pub const WAKE_PORT: u16 = 9;

/// Command code carried by the keep-alive datagram.
pub const KEEP_ALIVE_COMMAND: u32 = 2;

/// Status field a session-class camera flips once the live feed is usable.
pub const READY_STATUS_KEY: &str = "31";

/// HTTP port of the legacy (pre-UDP) live preview playlist.
pub const LEGACY_PREVIEW_PORT: u16 = 8080;
