//! What the server needs from the network substrate: a way to push bytes to
//! a session, and a stream of connection and packet events.

use async_trait::async_trait;

use tether_shared::{Delivery, SessionId, TransportError};

mod channel;

pub use channel::{EventSender, PacketChannel};

/// Something that happened on the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    Connected(SessionId),
    Disconnected(SessionId),
    Packet(SessionId, Box<[u8]>),
}

// PacketSender Trait
pub trait PacketSender: Send + Sync {
    /// Hands a packet to the transport for delivery to `session`
    fn send(
        &self,
        session: &SessionId,
        delivery: Delivery,
        payload: &[u8],
    ) -> Result<(), TransportError>;
}

// PacketReceiver Trait
#[async_trait]
pub trait PacketReceiver: Send {
    /// Waits for the next event. Returns `None` once the transport is closed.
    async fn receive(&mut self) -> Option<ServerEvent>;
}

#[async_trait]
impl<R: PacketReceiver + ?Sized> PacketReceiver for Box<R> {
    async fn receive(&mut self) -> Option<ServerEvent> {
        (**self).receive().await
    }
}
