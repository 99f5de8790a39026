//! What the client needs from the network substrate: a way to push bytes to
//! the server, and a stream of incoming packets.

use async_trait::async_trait;

use tether_shared::{Delivery, TransportError};

/// Something that happened on the connection to the server
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    Packet(Box<[u8]>),
    /// The session ended. Nothing is received after this.
    Disconnected,
}

// PacketSender Trait
pub trait PacketSender: Send + Sync {
    /// Hands a packet to the transport for delivery to the server
    fn send(&self, delivery: Delivery, payload: &[u8]) -> Result<(), TransportError>;
}

// PacketReceiver Trait
#[async_trait]
pub trait PacketReceiver: Send {
    /// Waits for the next event. Returns `None` once the transport is closed,
    /// which counts as a disconnect.
    async fn receive(&mut self) -> Option<ClientEvent>;
}

#[async_trait]
impl<R: PacketReceiver + ?Sized> PacketReceiver for Box<R> {
    async fn receive(&mut self) -> Option<ClientEvent> {
        (**self).receive().await
    }
}
