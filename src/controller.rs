use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::detect::ModelDetector;
use crate::protocol::stream::{Generation, StreamInitiator};
use crate::protocol::{heartbeat, wake};
use crate::types::{
    CameraEndpoint, ConnectionState, ControllerEvent, StreamOptions, StreamTarget,
};

const EVENT_CHANNEL_SIZE: usize = 64;

/// Timing and retry knobs for a connection, frozen at construction.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub http_timeout: Duration,
    pub keep_alive_interval: Duration,
    pub ready_poll_interval: Duration,
    pub ready_poll_max_attempts: u32,
    pub heartbeat_max_failures: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_millis(3000),
            keep_alive_interval: Duration::from_millis(heartbeat::KEEP_ALIVE_PERIOD_MS),
            ready_poll_interval: Duration::from_millis(500),
            ready_poll_max_attempts: 20,
            heartbeat_max_failures: 5,
        }
    }
}

/// A live camera session: its cancel token, its heartbeat task, and the
/// bookkeeping needed to close it down cleanly.
struct Session {
    cancel: CancellationToken,
    heartbeat: JoinHandle<()>,
    recording: bool,
    connected_at: chrono::DateTime<chrono::Utc>,
}

/// Drives the connection lifecycle for one configured camera:
/// wake -> detect -> stream start -> heartbeat, plus teardown.
///
/// All lifecycle operations serialize through the session lock, so a
/// reconnect issued while another is running (or while streaming) first
/// forces the old session down. At most one heartbeat loop exists per
/// endpoint at any time.
pub struct ConnectionController {
    endpoint: CameraEndpoint,
    options: StreamOptions,
    settings: ControllerSettings,
    http: reqwest::Client,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<ControllerEvent>,
    session: Mutex<Option<Session>>,
    // Tripped without taking the session lock, so an in-flight ready poll or
    // heartbeat sleep unblocks within one interval of a disconnect call.
    session_cancel: StdMutex<CancellationToken>,
    active_heartbeats: Arc<AtomicUsize>,
}

impl ConnectionController {
    pub fn new(
        endpoint: CameraEndpoint,
        options: StreamOptions,
        settings: ControllerSettings,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()?;
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Ok(Self {
            endpoint,
            options,
            settings,
            http,
            state_tx,
            event_tx,
            session: Mutex::new(None),
            session_cancel: StdMutex::new(CancellationToken::new()),
            active_heartbeats: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn endpoint(&self) -> &CameraEndpoint {
        &self.endpoint
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to the UI event stream.
    pub fn events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    /// Number of live heartbeat tasks. 0 or 1 by construction.
    pub fn active_heartbeat_tasks(&self) -> usize {
        self.active_heartbeats.load(Ordering::SeqCst)
    }

    /// Tear down any live session, then run the full connection sequence.
    ///
    /// On failure the `Failed` state is published with the error, then the
    /// machine rests at `Disconnected` ready for another attempt.
    pub async fn reconnect(&self) -> Result<StreamTarget> {
        let mut session = self.session.lock().await;
        self.teardown(&mut session).await;

        self.set_state(ConnectionState::Connecting);

        let cancel = CancellationToken::new();
        *self.session_cancel.lock().unwrap() = cancel.clone();

        match self.establish(&cancel).await {
            Ok((target, heartbeat, recording)) => {
                *session = Some(Session {
                    cancel,
                    heartbeat,
                    recording,
                    connected_at: Utc::now(),
                });
                Ok(target)
            }
            Err(e) => {
                self.report_error(&e);
                self.set_state(ConnectionState::Failed);
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Cancel the session and return to `Disconnected`.
    ///
    /// Safe to call from any state; the heartbeat and any in-progress ready
    /// poll observe the cancellation within one sleep interval.
    pub async fn disconnect(&self) {
        self.session_cancel.lock().unwrap().cancel();

        let mut session = self.session.lock().await;
        self.teardown(&mut session).await;

        if *self.state_tx.borrow() != ConnectionState::Disconnected {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    async fn establish(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(StreamTarget, JoinHandle<()>, bool)> {
        // One UDP socket per session, shared by the wake packet and the
        // heartbeat, released when the heartbeat task ends.
        let socket = Arc::new(
            UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(Error::SessionSocket)?,
        );

        // Wake is advisory: a camera that is already awake ignores it, and a
        // send failure must not sink the attempt
        if let Err(e) = wake::wake(&socket, &self.endpoint).await {
            self.report_error(&e);
        }

        let detector = ModelDetector::new(self.http.clone(), &self.endpoint);
        if detector.probe().await {
            debug!("camera answered its status endpoint");
        } else {
            debug!("no answer to the status probe, proceeding with detection");
        }

        let identity = detector.detect().await?;
        info!("📷 detected camera {}", identity);
        let _ = self.event_tx.send(ControllerEvent::Identity(identity.clone()));

        let generation = Generation::classify(&identity.model_id);
        if generation.is_session_class() {
            self.set_state(ConnectionState::WaitingForCameraReady);
        }

        let target = self.initiator().start(&identity, cancel).await?;
        self.set_state(ConnectionState::Streaming);
        info!("🎬 streaming started: {}", target);

        let heartbeat = self.spawn_heartbeat(socket, cancel.clone());
        let recording = self.options.record && generation != Generation::Legacy;

        Ok((target, heartbeat, recording))
    }

    async fn teardown(&self, session: &mut Option<Session>) {
        if let Some(session) = session.take() {
            session.cancel.cancel();

            if session.recording {
                if let Err(e) = self.initiator().stop_record().await {
                    warn!("failed to stop on-camera recording: {}", e);
                }
            }

            if session.heartbeat.await.is_err() {
                warn!("heartbeat task ended abnormally");
            }

            let connected_secs = (Utc::now() - session.connected_at).num_seconds();
            info!("🔌 session closed after {}s", connected_secs);
        }
    }

    fn spawn_heartbeat(&self, socket: Arc<UdpSocket>, cancel: CancellationToken) -> JoinHandle<()> {
        // Gauge goes up before the task is polled so the at-most-one-session
        // accounting is visible as soon as the spawn returns
        self.active_heartbeats.fetch_add(1, Ordering::SeqCst);

        let endpoint = self.endpoint.clone();
        let interval = self.settings.keep_alive_interval;
        let max_failures = self.settings.heartbeat_max_failures;
        let events = self.event_tx.clone();
        let state_tx = self.state_tx.clone();
        let gauge = self.active_heartbeats.clone();

        tokio::spawn(async move {
            let result = heartbeat::run(
                socket,
                endpoint,
                interval,
                max_failures,
                cancel.clone(),
                events.clone(),
            )
            .await;
            gauge.fetch_sub(1, Ordering::SeqCst);

            if let Err(e) = result {
                // The failure budget ran out; the stream is gone and the
                // session comes down with it
                warn!("💓 keep-alive loop aborted: {}", e);
                cancel.cancel();
                let _ = state_tx.send(ConnectionState::Disconnected);
                let _ = events.send(ControllerEvent::StateChanged(
                    ConnectionState::Disconnected,
                ));
            }
        })
    }

    fn initiator(&self) -> StreamInitiator {
        StreamInitiator::new(
            self.http.clone(),
            self.endpoint.clone(),
            self.options,
            self.settings.ready_poll_interval,
            self.settings.ready_poll_max_attempts,
        )
    }

    fn set_state(&self, state: ConnectionState) {
        debug!("connection state -> {}", state);
        let _ = self.state_tx.send(state.clone());
        let _ = self.event_tx.send(ControllerEvent::StateChanged(state));
    }

    fn report_error(&self, err: &Error) {
        if err.is_advisory() {
            debug!("advisory error: {}", err);
        } else {
            warn!("connection error: {}", err);
        }
        let _ = self.event_tx.send(ControllerEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}
