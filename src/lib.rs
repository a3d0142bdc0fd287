// gopro-stream: Wi-Fi control client for GoPro action cameras (wake, detect, stream, keep-alive)

pub mod config;
pub mod controller;
pub mod error;
pub mod player;
pub mod protocol;
pub mod telemetry;
pub mod types;

pub use controller::ConnectionController;
pub use error::Error;
