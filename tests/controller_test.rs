// End-to-end connection lifecycle tests over a mocked camera control plane.

use std::time::Duration;

use tokio::net::UdpSocket;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gopro_stream::controller::{ConnectionController, ControllerSettings};
use gopro_stream::error::{Error, ErrorKind};
use gopro_stream::protocol::heartbeat::KEEP_ALIVE_PERIOD_MS;
use gopro_stream::types::{
    CameraEndpoint, ConnectionState, ControllerEvent, StreamOptions, StreamTarget,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn test_controller(server: &MockServer, stream_port: u16) -> ConnectionController {
    let endpoint = CameraEndpoint {
        host: "127.0.0.1".to_string(),
        control_port: server.address().port(),
        stream_port,
        mac_address: "DEADBEEF0000".to_string(),
    };
    let settings = ControllerSettings {
        http_timeout: Duration::from_millis(500),
        keep_alive_interval: Duration::from_millis(KEEP_ALIVE_PERIOD_MS),
        ready_poll_interval: Duration::from_millis(10),
        ready_poll_max_attempts: 3,
        heartbeat_max_failures: 5,
    };
    ConnectionController::new(endpoint, StreamOptions::default(), settings).unwrap()
}

async fn mount_camera(server: &MockServer, firmware: &str, model_name: &str) {
    Mock::given(method("GET"))
        .and(path("/gp/gpControl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "info": {"firmware_version": firmware, "model_name": model_name}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gp/gpControl/execute"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, ready_level: u32) {
    Mock::given(method("GET"))
        .and(path("/gp/gpControl/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": {"31": ready_level}})),
        )
        .mount(server)
        .await;
}

fn drain(
    events: &mut tokio::sync::broadcast::Receiver<ControllerEvent>,
) -> (Vec<ConnectionState>, Vec<ErrorKind>) {
    let mut states = Vec::new();
    let mut errors = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            ControllerEvent::StateChanged(s) => states.push(s),
            ControllerEvent::Error { kind, .. } => errors.push(kind),
            ControllerEvent::Identity(_) => {}
        }
    }
    (states, errors)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_full_lifecycle_reaches_streaming_with_heartbeat() {
    let server = MockServer::start().await;
    mount_camera(&server, "HD4.01.02.03", "HERO4").await;
    mount_status(&server, 1).await;

    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let stream_port = receiver.local_addr().unwrap().port();

    let controller = test_controller(&server, stream_port);
    let mut events = controller.events();

    let target = controller.reconnect().await.unwrap();
    assert_eq!(target, StreamTarget::Udp { port: stream_port });
    assert_eq!(*controller.state().borrow(), ConnectionState::Streaming);
    assert_eq!(controller.active_heartbeat_tasks(), 1);

    let mut saw_identity = false;
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::Identity(identity) = event {
            assert_eq!(identity.model_id, "HD4.01");
            assert_eq!(identity.model_name, "HERO4");
            saw_identity = true;
        }
    }
    assert!(saw_identity, "identity event expected");

    // The heartbeat datagram shows up on the stream port
    let mut buf = [0u8; 64];
    let (n, _) = tokio::time::timeout(Duration::from_secs(1), receiver.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..n], b"_GPHD_:0:0:2:0.0\n");

    controller.disconnect().await;
    assert_eq!(*controller.state().borrow(), ConnectionState::Disconnected);
    assert_eq!(controller.active_heartbeat_tasks(), 0);
}

#[tokio::test]
async fn test_session_class_camera_passes_through_waiting_state() {
    let server = MockServer::start().await;
    mount_camera(&server, "HX1.01.02.03", "HERO4 Session").await;
    // Not ready for the first two status fetches, then ready
    Mock::given(method("GET"))
        .and(path("/gp/gpControl/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": {"31": 0}})),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_status(&server, 1).await;

    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let stream_port = receiver.local_addr().unwrap().port();

    let controller = test_controller(&server, stream_port);
    let mut events = controller.events();

    let target = controller.reconnect().await.unwrap();
    assert_eq!(target, StreamTarget::Udp { port: stream_port });

    let (states, _) = drain(&mut events);
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::WaitingForCameraReady,
            ConnectionState::Streaming,
        ]
    );

    controller.disconnect().await;
}

#[tokio::test]
async fn test_double_reconnect_keeps_a_single_session() {
    let server = MockServer::start().await;
    mount_camera(&server, "HD4.01.02.03", "HERO4").await;
    mount_status(&server, 1).await;

    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let stream_port = receiver.local_addr().unwrap().port();

    let controller = test_controller(&server, stream_port);
    controller.reconnect().await.unwrap();
    controller.reconnect().await.unwrap();

    assert_eq!(controller.active_heartbeat_tasks(), 1);
    assert_eq!(*controller.state().borrow(), ConnectionState::Streaming);

    controller.disconnect().await;
    assert_eq!(controller.active_heartbeat_tasks(), 0);
}

#[tokio::test]
async fn test_disconnect_without_session_is_a_no_op() {
    let server = MockServer::start().await;
    let controller = test_controller(&server, 8554);

    controller.disconnect().await;
    assert_eq!(*controller.state().borrow(), ConnectionState::Disconnected);
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_detection_failure_surfaces_and_resets() {
    // No mounted routes: every control endpoint answers 404
    let server = MockServer::start().await;

    let controller = test_controller(&server, 8554);
    let mut events = controller.events();

    let err = controller.reconnect().await.unwrap_err();
    assert!(matches!(err, Error::Unreachable { .. }));
    assert_eq!(*controller.state().borrow(), ConnectionState::Disconnected);
    assert_eq!(controller.active_heartbeat_tasks(), 0);

    let (states, errors) = drain(&mut events);
    assert!(states.contains(&ConnectionState::Failed));
    assert_eq!(states.last(), Some(&ConnectionState::Disconnected));
    assert!(errors.contains(&ErrorKind::Unreachable));
}

#[tokio::test]
async fn test_ready_poll_exhaustion_fails_the_attempt() {
    let server = MockServer::start().await;
    mount_camera(&server, "HX1.01.02.03", "HERO4 Session").await;
    mount_status(&server, 0).await;

    let controller = test_controller(&server, 8554);
    let mut events = controller.events();

    let err = controller.reconnect().await.unwrap_err();
    assert!(matches!(err, Error::ReadyPollFailed { attempts: 3 }));
    assert_eq!(*controller.state().borrow(), ConnectionState::Disconnected);
    assert_eq!(controller.active_heartbeat_tasks(), 0);

    let (states, errors) = drain(&mut events);
    assert!(states.contains(&ConnectionState::WaitingForCameraReady));
    assert!(states.contains(&ConnectionState::Failed));
    assert!(errors.contains(&ErrorKind::ReadyPollFailed));
}
