use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::KEEP_ALIVE_COMMAND;
use crate::types::{CameraEndpoint, ControllerEvent};

/// Interval between keep-alive datagrams; the camera closes the preview
/// stream if it misses a few of these.
pub const KEEP_ALIVE_PERIOD_MS: u64 = 2500;

/// Render a `_GPHD_` command datagram. All fields except the command code
/// are fixed at zero for the keep-alive use.
pub fn command_message(command: u32) -> Bytes {
    Bytes::from(format!("_GPHD_:{}:{}:{}:{:.1}\n", 0, 0, command, 0.0))
}

/// Keep-alive loop, one per session, run on its own task.
///
/// The datagram is built once and reused for every send. The cancel token is
/// checked every iteration, so shutdown latency is bounded by one interval.
/// Send failures are reported but tolerated until `max_failures` land in a
/// row, at which point the loop gives up and the session must come down.
pub async fn run(
    socket: Arc<UdpSocket>,
    endpoint: CameraEndpoint,
    interval: Duration,
    max_failures: u32,
    cancel: CancellationToken,
    events: broadcast::Sender<ControllerEvent>,
) -> Result<()> {
    let message = command_message(KEEP_ALIVE_COMMAND);
    let mut consecutive_failures = 0u32;

    debug!(
        "keep-alive loop started for {}:{} (every {:?})",
        endpoint.host, endpoint.stream_port, interval
    );

    loop {
        match socket
            .send_to(&message, (endpoint.host.as_str(), endpoint.stream_port))
            .await
        {
            Ok(_) => {
                consecutive_failures = 0;
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    "keep-alive send to {}:{} failed ({} in a row): {}",
                    endpoint.host, endpoint.stream_port, consecutive_failures, e
                );
                let err = Error::HeartbeatSendFailed {
                    consecutive: consecutive_failures,
                    source: e,
                };
                let _ = events.send(ControllerEvent::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                if consecutive_failures >= max_failures {
                    return Err(err);
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("keep-alive loop cancelled");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn test_endpoint(stream_port: u16) -> CameraEndpoint {
        CameraEndpoint {
            host: "127.0.0.1".to_string(),
            control_port: 80,
            stream_port,
            mac_address: "DEADBEEF0000".to_string(),
        }
    }

    #[test]
    fn test_keep_alive_message_bytes() {
        assert_eq!(&command_message(KEEP_ALIVE_COMMAND)[..], b"_GPHD_:0:0:2:0.0\n");
    }

    #[tokio::test]
    async fn test_cancellation_observed_within_one_period() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let stream_port = receiver.local_addr().unwrap().port();
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let (events, _) = broadcast::channel(16);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            sender,
            test_endpoint(stream_port),
            Duration::from_millis(KEEP_ALIVE_PERIOD_MS),
            5,
            cancel.clone(),
            events,
        ));

        tokio::time::sleep(Duration::from_millis(1)).await;
        cancel.cancel();
        assert_ok!(handle.await.unwrap());

        // Exactly one datagram went out before cancellation was observed
        let mut buf = [0u8; 64];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"_GPHD_:0:0:2:0.0\n");

        let followup =
            tokio::time::timeout(Duration::from_millis(100), receiver.recv_from(&mut buf)).await;
        assert!(followup.is_err(), "no second datagram expected");
    }
}
