use anyhow::Result;
use tokio::process::Command;
use tracing::info;

use crate::config::AppConfig;
use crate::types::StreamTarget;

/// Hand-off boundary to the external video player/recorder.
///
/// The core only decides which URL or port to hand over; whatever consumes
/// the feed lives outside this process.
pub trait StreamLauncher {
    fn launch_player(&self, target: &StreamTarget) -> Result<()>;
    fn launch_recorder(&self, target: &StreamTarget, destination: &str) -> Result<()>;
}

/// Default launcher shelling out to ffplay/ffmpeg.
pub struct FfmpegLauncher {
    verbose: bool,
    save_format: String,
}

impl FfmpegLauncher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            verbose: config.verbose,
            save_format: config.save_format.clone(),
        }
    }

    fn input_url(target: &StreamTarget) -> String {
        match target {
            // The @ form makes ffmpeg listen for the incoming UDP feed
            StreamTarget::Udp { port } => format!("udp://@:{}", port),
            StreamTarget::LegacyPreview { url } => url.clone(),
        }
    }
}

impl StreamLauncher for FfmpegLauncher {
    fn launch_player(&self, target: &StreamTarget) -> Result<()> {
        let url = Self::input_url(target);

        let mut cmd = Command::new("ffplay");
        if !self.verbose {
            cmd.args(["-loglevel", "panic"]);
        }
        if matches!(target, StreamTarget::Udp { .. }) {
            cmd.args(["-fflags", "nobuffer", "-f:v", "mpegts", "-probesize", "8192"]);
        }
        cmd.arg(&url);

        let child = cmd.spawn()?;
        info!("▶️ player launched for {} (pid {:?})", url, child.id());
        Ok(())
    }

    fn launch_recorder(&self, target: &StreamTarget, destination: &str) -> Result<()> {
        let url = Self::input_url(target);

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-i", &url]);
        cmd.args(["-fflags", "nobuffer", "-f:v", "mpegts", "-probesize", "8192"]);
        if self.save_format == "ts" {
            cmd.args(["-acodec", "copy", "-vcodec", "copy"]);
        }
        cmd.arg(destination);

        let child = cmd.spawn()?;
        info!("⏺️ recorder launched to {} (pid {:?})", destination, child.id());
        Ok(())
    }
}
