use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{CameraEndpoint, CameraIdentity, StatusSnapshot};

// Control-plane paths of the camera's wifi API
const CONTROL_INFO_PATH: &str = "/gp/gpControl";
const LEGACY_VERSION_PATH: &str = "/camera/cv";
const STATUS_PATH: &str = "/gp/gpControl/status";

/// Fetch the camera's status document.
///
/// Shared with the stream-init ready poll, which re-reads this repeatedly.
pub(crate) async fn fetch_status(http: &Client, endpoint: &CameraEndpoint) -> Result<StatusSnapshot> {
    let url = format!("{}{}", endpoint.control_url(), STATUS_PATH);
    let body: serde_json::Value = http
        .get(&url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|_| Error::Unreachable {
            host: endpoint.host.clone(),
        })?
        .json()
        .await
        .map_err(|e| Error::MalformedResponse {
            detail: e.to_string(),
        })?;

    Ok(StatusSnapshot::new(body))
}

/// Identifies the camera generation from its firmware string.
pub struct ModelDetector {
    http: Client,
    endpoint: CameraEndpoint,
}

impl ModelDetector {
    pub fn new(http: Client, endpoint: &CameraEndpoint) -> Self {
        Self {
            http,
            endpoint: endpoint.clone(),
        }
    }

    /// Presence check: does anything answer the status endpoint.
    pub async fn probe(&self) -> bool {
        fetch_status(&self.http, &self.endpoint).await.is_ok()
    }

    /// Fetch and classify the firmware string.
    ///
    /// The primary endpoint serves JSON; HERO3-era firmware breaks HTTP
    /// framing on it, so any transport or status failure there falls back to
    /// the raw legacy version endpoint.
    pub async fn detect(&self) -> Result<CameraIdentity> {
        let url = format!("{}{}", self.endpoint.control_url(), CONTROL_INFO_PATH);

        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body: serde_json::Value =
                    resp.json().await.map_err(|e| Error::MalformedResponse {
                        detail: e.to_string(),
                    })?;
                self.identity_from_info(&body)
            }
            Ok(resp) => {
                debug!(
                    "primary detection endpoint answered {}, trying legacy path",
                    resp.status()
                );
                self.detect_legacy().await
            }
            Err(e) => {
                debug!("primary detection endpoint failed ({}), trying legacy path", e);
                self.detect_legacy().await
            }
        }
    }

    fn identity_from_info(&self, body: &serde_json::Value) -> Result<CameraIdentity> {
        let info = &body["info"];
        let firmware = info["firmware_version"]
            .as_str()
            .ok_or_else(|| Error::MalformedResponse {
                detail: "missing info.firmware_version".to_string(),
            })?;
        let model_name = info["model_name"]
            .as_str()
            .ok_or_else(|| Error::MalformedResponse {
                detail: "missing info.model_name".to_string(),
            })?;

        Ok(CameraIdentity {
            model_id: classify_firmware(firmware),
            model_name: model_name.to_string(),
        })
    }

    /// HERO3-era fallback: the version endpoint serves the firmware string as
    /// plain text, and no model name is available.
    async fn detect_legacy(&self) -> Result<CameraIdentity> {
        let url = format!("{}{}", self.endpoint.control_url(), LEGACY_VERSION_PATH);

        let firmware = match self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
        {
            Ok(resp) => resp.text().await.map_err(|e| Error::MalformedResponse {
                detail: e.to_string(),
            })?,
            Err(e) => {
                warn!("camera unreachable on both detection endpoints: {}", e);
                return Err(Error::Unreachable {
                    host: self.endpoint.host.clone(),
                });
            }
        };

        Ok(CameraIdentity {
            model_id: classify_firmware(&firmware),
            model_name: String::new(),
        })
    }
}

/// Reduce a firmware string to the model id used for stream dispatch.
///
/// HERO3-era strings are unstructured and double as the identity; structured
/// strings like `HD4.01.02.03` keep the family plus the first revision
/// number, and anything else keeps the family segment alone.
pub fn classify_firmware(firmware: &str) -> String {
    if firmware.contains("Hero3") || firmware.contains("HERO3+") {
        return firmware.to_string();
    }

    let mut parts = firmware.split('.');
    let family = parts.next().unwrap_or(firmware);
    let numbers: Vec<&str> = parts.collect();

    if numbers.len() == 3
        && numbers
            .iter()
            .all(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    {
        format!("{}.{}", family, numbers[0])
    } else {
        family.to_string()
    }
}
