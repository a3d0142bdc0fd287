use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{detect, LEGACY_PREVIEW_PORT};
use crate::types::{CameraEndpoint, CameraIdentity, StreamOptions, StreamTarget};

const STREAM_RESTART_PATH: &str = "/gp/gpControl/execute?p1=gpStream&a1=proto_v2&c1=restart";
const SHUTTER_ON_PATH: &str = "/gp/gpControl/command/shutter?p=1";
const SHUTTER_OFF_PATH: &str = "/gp/gpControl/command/shutter?p=0";
const BACPAC_PASSWORD_PATH: &str = "/bacpac/sd";
const LEGACY_PREVIEW_AUTH_PATH: &str = "/camera/PV";

/// Model families with the UDP stream protocol.
const MODERN_MODELS: [&str; 5] = ["HD4", "HD3.22", "HD5", "HD6", "H18"];

/// Camera generations with distinct stream-start sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// UDP stream via the gpControl execute command.
    Modern,
    /// Modern, but gated behind the ready bit in the status document.
    SessionClass,
    /// HERO3-era password-authorized HTTP preview.
    Legacy,
    Unknown,
}

impl Generation {
    /// Model ids come out of detection as either a bare family (`HD4`) or a
    /// family plus revision (`HD4.01`), so membership is checked against both
    /// the full id and its family segment.
    pub fn classify(model_id: &str) -> Self {
        let family = model_id.split('.').next().unwrap_or(model_id);
        if model_id.contains("HX") {
            Generation::SessionClass
        } else if MODERN_MODELS.contains(&model_id) || MODERN_MODELS.contains(&family) {
            Generation::Modern
        } else if model_id.contains("Hero3") || model_id.contains("HERO3+") {
            Generation::Legacy
        } else {
            Generation::Unknown
        }
    }

    pub fn is_session_class(self) -> bool {
        matches!(self, Generation::SessionClass)
    }
}

/// Runs the generation-specific command sequence that opens the live feed.
pub struct StreamInitiator {
    http: Client,
    endpoint: CameraEndpoint,
    options: StreamOptions,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

impl StreamInitiator {
    pub fn new(
        http: Client,
        endpoint: CameraEndpoint,
        options: StreamOptions,
        poll_interval: Duration,
        poll_max_attempts: u32,
    ) -> Self {
        Self {
            http,
            endpoint,
            options,
            poll_interval,
            poll_max_attempts,
        }
    }

    /// Start the stream for the detected model.
    ///
    /// Unknown models are rejected before any command goes out. The returned
    /// target is where the external player should attach.
    pub async fn start(
        &self,
        identity: &CameraIdentity,
        cancel: &CancellationToken,
    ) -> Result<StreamTarget> {
        match Generation::classify(&identity.model_id) {
            Generation::Modern | Generation::SessionClass => {
                self.start_modern(identity, cancel).await
            }
            Generation::Legacy => self.start_legacy().await,
            Generation::Unknown => Err(Error::UnsupportedModel {
                model_id: identity.model_id.clone(),
            }),
        }
    }

    async fn start_modern(
        &self,
        identity: &CameraIdentity,
        cancel: &CancellationToken,
    ) -> Result<StreamTarget> {
        info!("starting UDP stream for {}", identity.model_id);

        self.control_get(STREAM_RESTART_PATH)
            .await
            .map_err(|e| Error::StartCommandFailed {
                detail: e.to_string(),
            })?;

        if self.options.record {
            // Stream stays usable even if the camera refuses the shutter
            if let Err(e) = self.control_get(SHUTTER_ON_PATH).await {
                warn!("record command failed: {}", e);
            } else {
                info!("recording started on camera");
            }
        }

        if Generation::classify(&identity.model_id).is_session_class() {
            self.wait_until_ready(cancel).await?;
        }

        if self.options.verbose {
            info!(
                "UDP target {}:{}",
                self.endpoint.host, self.endpoint.stream_port
            );
        }

        Ok(StreamTarget::Udp {
            port: self.endpoint.stream_port,
        })
    }

    /// Poll the status document until the ready bit reads >= 1.
    ///
    /// Bounded: a camera that never flips the bit, or a control plane that
    /// stops answering, surfaces as `ReadyPollFailed` instead of a livelock.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<()> {
        for attempt in 1..=self.poll_max_attempts {
            match detect::fetch_status(&self.http, &self.endpoint).await {
                Ok(status) if status.is_stream_ready() => {
                    debug!("camera ready after {} status polls", attempt);
                    return Ok(());
                }
                Ok(_) => debug!("camera not ready yet (poll {})", attempt),
                Err(e) => warn!("status poll {} failed: {}", attempt, e),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(Error::ReadyPollFailed { attempts: attempt });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        Err(Error::ReadyPollFailed {
            attempts: self.poll_max_attempts,
        })
    }

    /// HERO3-era flow: read the device password, strip it down to word
    /// characters, authorize the preview with it.
    async fn start_legacy(&self) -> Result<StreamTarget> {
        info!("starting legacy preview stream");

        let password = self
            .control_get(BACPAC_PASSWORD_PATH)
            .await
            .map_err(|e| Error::StartCommandFailed {
                detail: e.to_string(),
            })?
            .text()
            .await
            .map_err(|e| Error::MalformedResponse {
                detail: e.to_string(),
            })?;
        let token: String = password
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        let auth_path = format!("{}?t={}&p=02", LEGACY_PREVIEW_AUTH_PATH, token);
        self.control_get(&auth_path)
            .await
            .map_err(|e| Error::StartCommandFailed {
                detail: e.to_string(),
            })?;

        Ok(StreamTarget::LegacyPreview {
            url: format!(
                "http://{}:{}/live/amba.m3u8",
                self.endpoint.host, LEGACY_PREVIEW_PORT
            ),
        })
    }

    /// Close the on-camera recording; the teardown mirror of the shutter-on
    /// command, best-effort only.
    pub async fn stop_record(&self) -> Result<()> {
        self.control_get(SHUTTER_OFF_PATH)
            .await
            .map_err(|e| Error::StartCommandFailed {
                detail: e.to_string(),
            })?;
        Ok(())
    }

    async fn control_get(&self, path: &str) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}{}", self.endpoint.control_url(), path);
        self.http.get(&url).send().await?.error_for_status()
    }
}
