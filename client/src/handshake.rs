use std::time::Duration;

use log::debug;

use tether_shared::{Manifest, Packet};

use crate::{
    transport::{ClientEvent, PacketReceiver},
    HandshakeError,
};

/// Waits for the manifest, which the server sends before anything else
pub(crate) async fn receive_manifest<R: PacketReceiver + ?Sized>(
    receiver: &mut R,
    limit: Duration,
) -> Result<Manifest, HandshakeError> {
    let event = tokio::time::timeout(limit, receiver.receive())
        .await
        .map_err(|_| HandshakeError::Timeout {
            millis: limit.as_millis(),
        })?;

    match event {
        Some(ClientEvent::Packet(bytes)) => match Packet::from_bytes(&bytes)? {
            Packet::Manifest(manifest) => {
                debug!(
                    "Handshake complete: {} channels exposed",
                    manifest.channel_count()
                );
                Ok(manifest)
            }
            other => Err(HandshakeError::UnexpectedPacket {
                packet: other.name(),
            }),
        },
        Some(ClientEvent::Disconnected) | None => Err(HandshakeError::Disconnected),
    }
}
