use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::controller::ControllerSettings;
use crate::protocol::heartbeat::KEEP_ALIVE_PERIOD_MS;
use crate::types::{CameraEndpoint, StreamOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera_host: String,
    pub control_port: u16,
    pub stream_port: u16,
    pub camera_mac: String,

    pub record: bool,
    pub verbose: bool,
    pub save: bool,
    pub save_location: String,
    pub save_filename: String,
    pub save_format: String,

    pub http_timeout_ms: u64,
    pub keep_alive_interval_ms: u64,
    pub ready_poll_interval_ms: u64,
    pub ready_poll_max_attempts: u32,
    pub heartbeat_max_failures: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera_host: "10.5.5.9".to_string(),
            control_port: 80,
            stream_port: 8554,
            camera_mac: "DEADBEEF0000".to_string(),

            record: false,
            verbose: true,
            save: false,
            save_location: "/tmp/".to_string(),
            save_filename: "goprofeed".to_string(),
            save_format: "ts".to_string(),

            http_timeout_ms: 3000,
            keep_alive_interval_ms: KEEP_ALIVE_PERIOD_MS,
            ready_poll_interval_ms: 500,
            ready_poll_max_attempts: 20,
            heartbeat_max_failures: 5,
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        if let Ok(config_str) = fs::read_to_string(path) {
            let config: AppConfig = serde_json::from_str(&config_str)?;
            return Ok(config);
        }

        tracing::warn!("{} not found, using default configuration", path);
        Ok(AppConfig::default())
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = serde_json::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    /// Freeze the camera addressing part of the config into an endpoint value.
    pub fn endpoint(&self) -> CameraEndpoint {
        CameraEndpoint {
            host: self.camera_host.clone(),
            control_port: self.control_port,
            stream_port: self.stream_port,
            mac_address: self.camera_mac.clone(),
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            record: self.record,
            verbose: self.verbose,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            http_timeout: Duration::from_millis(self.http_timeout_ms),
            keep_alive_interval: Duration::from_millis(self.keep_alive_interval_ms),
            ready_poll_interval: Duration::from_millis(self.ready_poll_interval_ms),
            ready_poll_max_attempts: self.ready_poll_max_attempts,
            heartbeat_max_failures: self.heartbeat_max_failures,
        }
    }

    /// Destination file for the save-to-disk mode, e.g. `/tmp/goprofeed.ts`.
    pub fn save_path(&self) -> String {
        format!(
            "{}{}.{}",
            self.save_location, self.save_filename, self.save_format
        )
    }
}
