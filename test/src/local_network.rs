//! In-memory transport connecting one server to any number of clients.
//! Routes packets through tokio channels without network I/O, applying a
//! [`LinkConditionerConfig`] on the way.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use log::{debug, trace};
use parking_lot::Mutex;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::{sleep_until, Instant},
};

use tether_client::transport::{
    ClientEvent, PacketReceiver as ClientPacketReceiver, PacketSender as ClientPacketSender,
};
use tether_server::transport::{
    PacketReceiver as ServerPacketReceiver, PacketSender as ServerPacketSender, ServerEvent,
};
use tether_shared::{Delivery, LinkConditionerConfig, SessionId, TransportError};

// Link
/// One direction of a connection. With latency, a forwarder task holds each
/// event until it is due, so order is preserved.
enum Link<E> {
    Direct(UnboundedSender<E>),
    Delayed(UnboundedSender<(Instant, E)>),
}

impl<E: Send + 'static> Link<E> {
    fn new(target: UnboundedSender<E>, config: &LinkConditionerConfig) -> Self {
        if config.latency.is_zero() {
            return Link::Direct(target);
        }

        let (sender, mut queue) = mpsc::unbounded_channel::<(Instant, E)>();
        tokio::spawn(async move {
            while let Some((due, event)) = queue.recv().await {
                sleep_until(due).await;
                if target.send(event).is_err() {
                    break;
                }
            }
        });
        Link::Delayed(sender)
    }

    fn send(&self, event: E, config: &LinkConditionerConfig) -> bool {
        match self {
            Link::Direct(target) => target.send(event).is_ok(),
            Link::Delayed(queue) => queue.send((Instant::now() + config.latency, event)).is_ok(),
        }
    }
}

fn dropped(delivery: Delivery, config: &LinkConditionerConfig) -> bool {
    delivery == Delivery::Unreliable
        && config.unreliable_loss > 0.0
        && fastrand::f32() < config.unreliable_loss
}

struct NetworkInner {
    config: LinkConditionerConfig,
    to_server: Link<ServerEvent>,
    to_clients: Mutex<HashMap<SessionId, Link<ClientEvent>>>,
    next_session: AtomicU64,
}

// LocalNetwork
/// The server side of the transport is created with the network; each call
/// to [`connect`](LocalNetwork::connect) opens a new session.
///
/// Must be created inside a tokio runtime when the config adds latency.
#[derive(Clone)]
pub struct LocalNetwork {
    inner: Arc<NetworkInner>,
}

impl LocalNetwork {
    pub fn new(config: LinkConditionerConfig) -> (Self, LocalServerSender, LocalServerReceiver) {
        let (server_events, server_queue) = mpsc::unbounded_channel();
        let inner = Arc::new(NetworkInner {
            to_server: Link::new(server_events, &config),
            config,
            to_clients: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        });

        let network = Self { inner };
        let sender = LocalServerSender {
            network: network.clone(),
        };
        let receiver = LocalServerReceiver {
            queue: server_queue,
        };
        (network, sender, receiver)
    }

    pub fn perfect() -> (Self, LocalServerSender, LocalServerReceiver) {
        Self::new(LinkConditionerConfig::perfect_condition())
    }

    /// Opens a session. The server sees it connect right away.
    pub fn connect(&self) -> (SessionId, LocalClientSender, LocalClientReceiver) {
        let session = SessionId::from_u64(self.inner.next_session.fetch_add(1, Ordering::Relaxed));
        let (client_events, client_queue) = mpsc::unbounded_channel();
        self.inner
            .to_clients
            .lock()
            .insert(session, Link::new(client_events, &self.inner.config));
        self.inner
            .to_server
            .send(ServerEvent::Connected(session), &self.inner.config);
        debug!("Local network opened {session}");

        let sender = LocalClientSender {
            network: self.clone(),
            session,
        };
        let receiver = LocalClientReceiver {
            queue: client_queue,
        };
        (session, sender, receiver)
    }

    /// Closes a session. Both ends are told.
    pub fn disconnect(&self, session: SessionId) {
        let link = self.inner.to_clients.lock().remove(&session);
        if let Some(link) = link {
            link.send(ClientEvent::Disconnected, &self.inner.config);
            self.inner
                .to_server
                .send(ServerEvent::Disconnected(session), &self.inner.config);
            debug!("Local network closed {session}");
        }
    }

    pub fn is_open(&self, session: SessionId) -> bool {
        self.inner.to_clients.lock().contains_key(&session)
    }

    pub fn config(&self) -> &LinkConditionerConfig {
        &self.inner.config
    }
}

// Server Transport

pub struct LocalServerSender {
    network: LocalNetwork,
}

impl ServerPacketSender for LocalServerSender {
    fn send(
        &self,
        session: &SessionId,
        delivery: Delivery,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let config = &self.network.inner.config;
        let clients = self.network.inner.to_clients.lock();
        let Some(link) = clients.get(session) else {
            return Err(TransportError::SessionClosed { session: *session });
        };
        if dropped(delivery, config) {
            trace!("Dropped {} byte unreliable packet to {session}", payload.len());
            return Ok(());
        }
        if link.send(ClientEvent::Packet(payload.into()), config) {
            Ok(())
        } else {
            Err(TransportError::SessionClosed { session: *session })
        }
    }
}

pub struct LocalServerReceiver {
    queue: UnboundedReceiver<ServerEvent>,
}

#[async_trait]
impl ServerPacketReceiver for LocalServerReceiver {
    async fn receive(&mut self) -> Option<ServerEvent> {
        self.queue.recv().await
    }
}

// Client Transport

pub struct LocalClientSender {
    network: LocalNetwork,
    session: SessionId,
}

impl ClientPacketSender for LocalClientSender {
    fn send(&self, delivery: Delivery, payload: &[u8]) -> Result<(), TransportError> {
        if !self.network.is_open(self.session) {
            return Err(TransportError::ConnectionClosed);
        }
        let config = &self.network.inner.config;
        if dropped(delivery, config) {
            trace!("Dropped {} byte unreliable packet from {}", payload.len(), self.session);
            return Ok(());
        }
        let event = ServerEvent::Packet(self.session, payload.into());
        if self.network.inner.to_server.send(event, config) {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }
}

pub struct LocalClientReceiver {
    queue: UnboundedReceiver<ClientEvent>,
}

#[async_trait]
impl ClientPacketReceiver for LocalClientReceiver {
    async fn receive(&mut self) -> Option<ClientEvent> {
        self.queue.recv().await
    }
}
