use std::sync::{Arc, OnceLock};

use log::trace;

use tether_shared::{
    Args, ChannelId, ChannelKind, Delivery, Flow, HostType, MiddlewarePipeline, Packet, SessionId,
};

use crate::{transport::PacketSender, ChannelError, SessionManager};

mod method;
mod property;
mod router;
mod signal;

pub(crate) use method::{erase_method, MethodHandler};
pub use property::RemoteProperty;
pub(crate) use router::{RemoteRouter, RouteTable};
pub use signal::RemoteSignal;

// Outbox
/// The transport every bound handle sends through, attached when the server
/// starts, plus the session list used to resolve broadcast targets
pub(crate) struct Outbox {
    sender: OnceLock<Arc<dyn PacketSender>>,
    sessions: SessionManager,
}

impl Outbox {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sender: OnceLock::new(),
            sessions,
        }
    }

    pub fn attach(&self, sender: Arc<dyn PacketSender>) -> bool {
        self.sender.set(sender).is_ok()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn send(
        &self,
        session: SessionId,
        delivery: Delivery,
        packet: &Packet,
    ) -> Result<(), ChannelError> {
        let sender = self.sender.get().ok_or(ChannelError::NotStarted)?;
        let bytes = packet.to_bytes()?;
        trace!("Sending {} packet ({} bytes) to {session}", packet.name(), bytes.len());
        sender.send(&session, delivery, &bytes)?;
        Ok(())
    }
}

// Binding
/// What an exposed channel needs to reach the network: its identity, the
/// middleware of its service, and the outbox
pub(crate) struct Binding {
    pub channel: ChannelId,
    pub pipeline: MiddlewarePipeline,
    pub outbox: Arc<Outbox>,
}

impl Binding {
    /// Runs the outbound middleware for `target`. `None` means rejected.
    pub fn outbound(&self, target: Option<SessionId>, args: Args) -> Option<Args> {
        match self
            .pipeline
            .run_outbound(HostType::Server, target, &self.channel, args)
        {
            Flow::Proceed(args) => Some(args),
            Flow::Reject => None,
        }
    }

    /// Runs the inbound middleware for a packet from `session`. `None` means
    /// rejected.
    pub fn inbound(&self, session: SessionId, args: Args) -> Option<Args> {
        match self
            .pipeline
            .run_inbound(HostType::Server, Some(session), &self.channel, args)
        {
            Flow::Proceed(args) => Some(args),
            Flow::Reject => None,
        }
    }

    pub fn send(
        &self,
        session: SessionId,
        delivery: Delivery,
        packet: &Packet,
    ) -> Result<(), ChannelError> {
        self.outbox.send(session, delivery, packet)
    }

    pub fn sessions(&self) -> &SessionManager {
        self.outbox.sessions()
    }
}

// Endpoints

/// Inbound side of a signal handle
pub(crate) trait SignalInbox: Send + Sync {
    fn bind(&self, binding: Arc<Binding>) -> bool;
    fn is_bound(&self) -> bool;
    fn deliver(&self, session: SessionId, args: Args) -> Result<(), tether_shared::PayloadError>;
}

/// Session-facing side of a property handle
pub(crate) trait PropertyEndpoint: Send + Sync {
    fn bind(&self, binding: Arc<Binding>) -> bool;
    fn is_bound(&self) -> bool;
    /// Pushes the effective value to a session that just connected
    fn greet(&self, session: SessionId);
    /// Drops the override and the observers of a session that disconnected
    fn forget(&self, session: SessionId);
}

/// One entry of a service's client table
pub(crate) enum Endpoint {
    Signal {
        delivery: Delivery,
        inbox: Arc<dyn SignalInbox>,
    },
    Property(Arc<dyn PropertyEndpoint>),
    Method(MethodHandler),
}

impl Endpoint {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Endpoint::Signal { delivery, .. } => ChannelKind::Signal(*delivery),
            Endpoint::Property(_) => ChannelKind::Property,
            Endpoint::Method(_) => ChannelKind::Method,
        }
    }

    pub fn is_bound(&self) -> bool {
        match self {
            Endpoint::Signal { inbox, .. } => inbox.is_bound(),
            Endpoint::Property(property) => property.is_bound(),
            Endpoint::Method(_) => false,
        }
    }

    pub fn bind(&self, binding: Arc<Binding>) -> bool {
        match self {
            Endpoint::Signal { inbox, .. } => inbox.bind(binding),
            Endpoint::Property(property) => property.bind(binding),
            Endpoint::Method(_) => true,
        }
    }
}
