use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use gopro_stream::config::AppConfig;
use gopro_stream::controller::ConnectionController;
use gopro_stream::player::{FfmpegLauncher, StreamLauncher};
use gopro_stream::telemetry;
use gopro_stream::types::ControllerEvent;

const CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_telemetry();

    let config = AppConfig::load(CONFIG_PATH)?;
    if !Path::new(CONFIG_PATH).exists() {
        config.save(CONFIG_PATH)?;
        info!("⚙️ wrote default configuration to {}", CONFIG_PATH);
    }
    info!(
        "⚙️ camera {} (stream port {}, record: {})",
        config.camera_host, config.stream_port, config.record
    );

    let controller = ConnectionController::new(
        config.endpoint(),
        config.stream_options(),
        config.controller_settings(),
    )?;
    let launcher = FfmpegLauncher::new(&config);

    // UI surface of the core: every state, identity, and error event
    let mut events = controller.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ControllerEvent::StateChanged(state) => info!("connection state: {}", state),
                ControllerEvent::Identity(identity) => info!("camera identified: {}", identity),
                ControllerEvent::Error { kind, message } => {
                    warn!("camera error ({:?}): {}", kind, message)
                }
            }
        }
    });

    info!("🚀 connecting to camera at {}...", config.camera_host);
    match controller.reconnect().await {
        Ok(target) => {
            if config.save {
                launcher.launch_recorder(&target, &config.save_path())?;
            } else {
                launcher.launch_player(&target)?;
            }
        }
        Err(e) => {
            error!("initial connection failed: {}", e);
            return Err(e.into());
        }
    }

    info!("press ctrl+c to quit");
    tokio::signal::ctrl_c().await?;

    controller.disconnect().await;
    info!("🛑 shutdown complete");
    Ok(())
}
