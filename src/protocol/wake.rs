use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::WAKE_PORT;
use crate::types::CameraEndpoint;

/// Sync-stream prefix of the magic packet, six bytes of 0xFF in hex.
const SYNC_PREFIX: &str = "FFFFFFFFFFFF";

/// How many times the MAC is repeated in the payload. The vendor app pads
/// past the canonical 16 repeats and the firmware expects the longer packet,
/// so this stays at 20.
const MAC_REPEAT: usize = 20;

/// Strip separators and validate the MAC down to 12 hex digits.
///
/// Accepts the bare 12-digit form and the separated 17-char form, where the
/// character at offset 2 is taken as the separator in use.
pub fn normalize_mac(mac: &str) -> Result<String> {
    let cleaned: String = if mac.len() == 12 {
        mac.to_string()
    } else if mac.len() == 17 {
        let sep = mac.as_bytes()[2] as char;
        mac.chars().filter(|c| *c != sep).collect()
    } else {
        return Err(Error::InvalidMacAddress {
            mac: mac.to_string(),
        });
    };

    if cleaned.len() != 12 || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidMacAddress {
            mac: mac.to_string(),
        });
    }

    Ok(cleaned)
}

/// Build the 126-byte wake payload: 6 bytes of 0xFF, then the MAC x20.
pub fn build_magic_packet(mac: &str) -> Result<Bytes> {
    let mac = normalize_mac(mac)?;
    let hex_stream = format!("{}{}", SYNC_PREFIX, mac.repeat(MAC_REPEAT));
    let payload = hex::decode(&hex_stream).map_err(|_| Error::InvalidMacAddress {
        mac: mac.to_string(),
    })?;
    Ok(Bytes::from(payload))
}

/// Broadcast one magic packet at the camera's network interface.
///
/// Fire-and-forget: the camera never acknowledges, and the caller decides
/// whether a send failure matters.
pub async fn wake(socket: &UdpSocket, endpoint: &CameraEndpoint) -> Result<()> {
    let payload = build_magic_packet(&endpoint.mac_address)?;

    socket.set_broadcast(true).map_err(Error::WakeSendFailed)?;
    socket
        .send_to(&payload, (endpoint.host.as_str(), WAKE_PORT))
        .await
        .map_err(Error::WakeSendFailed)?;

    debug!(
        "wake packet sent to {}:{} ({} bytes)",
        endpoint.host,
        WAKE_PORT,
        payload.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_packet_layout() {
        let packet = build_magic_packet("DEADBEEF0000").unwrap();

        assert_eq!(packet.len(), 126);
        assert!(packet[..6].iter().all(|b| *b == 0xFF));

        let mac_bytes = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00];
        for repeat in 0..20 {
            let offset = 6 + repeat * 6;
            assert_eq!(&packet[offset..offset + 6], &mac_bytes);
        }
    }

    #[test]
    fn test_separated_mac_is_normalized() {
        assert_eq!(normalize_mac("DE:AD:BE:EF:00:00").unwrap(), "DEADBEEF0000");
        assert_eq!(normalize_mac("de-ad-be-ef-00-00").unwrap(), "deadbeef0000");
        assert_eq!(
            build_magic_packet("DE:AD:BE:EF:00:00").unwrap(),
            build_magic_packet("DEADBEEF0000").unwrap()
        );
    }

    #[test]
    fn test_bad_macs_are_rejected() {
        for mac in ["", "DEADBEEF", "DEADBEEF00001", "GGADBEEF0000", "DE:AD:BE:EF:00:0Z"] {
            assert!(
                matches!(normalize_mac(mac), Err(Error::InvalidMacAddress { .. })),
                "expected rejection for {:?}",
                mac
            );
        }
    }
}
