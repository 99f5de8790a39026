use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use tether_shared::{SessionId, TransportError};

use super::{PacketReceiver, ServerEvent};

/// An in-process event queue, for embedding the server behind a transport
/// that delivers events through callbacks
pub struct PacketChannel;

impl PacketChannel {
    pub fn unbounded() -> (EventSender, Box<dyn PacketReceiver>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (EventSender { sender }, Box::new(PacketChannelReceiver { receiver }))
    }
}

/// Feeding end of a [`PacketChannel`]
#[derive(Clone)]
pub struct EventSender {
    sender: UnboundedSender<ServerEvent>,
}

impl EventSender {
    pub fn connected(&self, session: SessionId) -> Result<(), TransportError> {
        self.push(ServerEvent::Connected(session))
    }

    pub fn disconnected(&self, session: SessionId) -> Result<(), TransportError> {
        self.push(ServerEvent::Disconnected(session))
    }

    pub fn packet(&self, session: SessionId, payload: &[u8]) -> Result<(), TransportError> {
        self.push(ServerEvent::Packet(session, payload.into()))
    }

    pub fn push(&self, event: ServerEvent) -> Result<(), TransportError> {
        self.sender
            .send(event)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

struct PacketChannelReceiver {
    receiver: UnboundedReceiver<ServerEvent>,
}

#[async_trait]
impl PacketReceiver for PacketChannelReceiver {
    async fn receive(&mut self) -> Option<ServerEvent> {
        self.receiver.recv().await
    }
}
