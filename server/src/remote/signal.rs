use std::sync::{Arc, OnceLock};

use log::{debug, warn};

use tether_shared::{
    Args, ChannelId, Delivery, Listeners, Packet, Payload, PayloadError, SessionId, Subscription,
};

use super::{Binding, Endpoint, SignalInbox};
use crate::ChannelError;

struct SignalShared<T> {
    delivery: Delivery,
    binding: OnceLock<Arc<Binding>>,
    listeners: Listeners<(SessionId, T)>,
}

/// A fire-and-forget event channel between a service and its clients.
///
/// Create it unbound, keep it in the service, and expose it from
/// [`Service::client`](crate::Service::client). Nothing is retained: a fire
/// reaches the sessions connected at that moment and nobody else.
pub struct RemoteSignal<T: Payload> {
    shared: Arc<SignalShared<T>>,
}

impl<T: Payload> Clone for RemoteSignal<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Payload> Default for RemoteSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> RemoteSignal<T> {
    /// A signal sent over the reliable ordered channel
    pub fn new() -> Self {
        Self::with_delivery(Delivery::Reliable)
    }

    /// A signal sent over the unreliable channel, when the transport has one
    pub fn unreliable() -> Self {
        Self::with_delivery(Delivery::Unreliable)
    }

    pub fn with_delivery(delivery: Delivery) -> Self {
        Self {
            shared: Arc::new(SignalShared {
                delivery,
                binding: OnceLock::new(),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn delivery(&self) -> Delivery {
        self.shared.delivery
    }

    pub fn channel(&self) -> Option<&ChannelId> {
        self.shared.binding.get().map(|binding| &binding.channel)
    }

    // Outgoing

    /// Fires to one session
    pub fn fire(&self, session: SessionId, payload: &T) -> Result<(), ChannelError> {
        let binding = self.binding()?;
        if !binding.sessions().is_connected(session) {
            return Err(ChannelError::SessionNotConnected { session });
        }
        let args = Args::encode(payload)?;
        self.deliver(binding, session, args)
    }

    /// Fires to every connected session
    pub fn fire_all(&self, payload: &T) -> Result<(), ChannelError> {
        let binding = self.binding()?;
        self.broadcast(binding, binding.sessions().sessions(), payload)
    }

    /// Fires to every connected session but one
    pub fn fire_except(&self, excluded: SessionId, payload: &T) -> Result<(), ChannelError> {
        self.fire_filter(|session| session != excluded, payload)
    }

    /// Fires to every connected session matching `predicate`
    pub fn fire_filter<F: Fn(SessionId) -> bool>(
        &self,
        predicate: F,
        payload: &T,
    ) -> Result<(), ChannelError> {
        let binding = self.binding()?;
        let targets = binding
            .sessions()
            .sessions()
            .into_iter()
            .filter(|session| predicate(*session));
        self.broadcast(binding, targets, payload)
    }

    /// Fires to each listed session that is still connected
    pub fn fire_for<I: IntoIterator<Item = SessionId>>(
        &self,
        sessions: I,
        payload: &T,
    ) -> Result<(), ChannelError> {
        let binding = self.binding()?;
        let targets = sessions.into_iter().filter(|session| {
            let connected = binding.sessions().is_connected(*session);
            if !connected {
                debug!("Skipping {session} on {}: not connected", binding.channel);
            }
            connected
        });
        self.broadcast(binding, targets, payload)
    }

    // Incoming

    /// Calls `handler` with the sending session and payload of every fire
    /// from a client that passed the inbound middleware
    pub fn connect<F: Fn(SessionId, &T) + Send + Sync + 'static>(
        &self,
        handler: F,
    ) -> Subscription {
        self.shared
            .listeners
            .connect(move |(session, payload): &(SessionId, T)| handler(*session, payload))
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::Signal {
            delivery: self.shared.delivery,
            inbox: self.shared.clone(),
        }
    }

    fn binding(&self) -> Result<&Arc<Binding>, ChannelError> {
        self.shared.binding.get().ok_or(ChannelError::Unbound)
    }

    fn broadcast(
        &self,
        binding: &Binding,
        targets: impl IntoIterator<Item = SessionId>,
        payload: &T,
    ) -> Result<(), ChannelError> {
        let args = Args::encode(payload)?;
        for session in targets {
            if let Err(err) = self.deliver(binding, session, args.clone()) {
                warn!("Failed to fire {} to {session}: {err}", binding.channel);
            }
        }
        Ok(())
    }

    fn deliver(
        &self,
        binding: &Binding,
        session: SessionId,
        args: Args,
    ) -> Result<(), ChannelError> {
        // outbound middleware runs once per target
        let Some(args) = binding.outbound(Some(session), args) else {
            return Ok(());
        };
        let packet = Packet::Signal {
            channel: binding.channel.clone(),
            args,
        };
        binding.send(session, self.shared.delivery, &packet)
    }
}

impl<T: Payload> SignalInbox for SignalShared<T> {
    fn bind(&self, binding: Arc<Binding>) -> bool {
        self.binding.set(binding).is_ok()
    }

    fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    fn deliver(&self, session: SessionId, args: Args) -> Result<(), PayloadError> {
        let payload = args.decode::<T>()?;
        self.listeners.emit(&(session, payload));
        Ok(())
    }
}
