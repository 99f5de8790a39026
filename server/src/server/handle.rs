use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use tether_shared::{LookupError, Manifest, SessionId, UnitState, UnitStates, Units};

use crate::{
    remote::RemoteRouter,
    transport::{PacketReceiver, ServerEvent},
    ServerConfig, Service, SessionError, SessionManager,
};

struct HandleInner {
    server_config: ServerConfig,
    router: RemoteRouter,
    sessions: SessionManager,
    units: Arc<Units>,
    states: UnitStates,
    start_tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// A started server. Feed it transport events through
/// [`listen`](ServerHandle::listen), or one at a time with
/// [`handle`](ServerHandle::handle).
#[derive(Clone)]
pub struct ServerHandle {
    inner: Arc<HandleInner>,
}

impl ServerHandle {
    pub(crate) fn new(
        server_config: ServerConfig,
        router: RemoteRouter,
        sessions: SessionManager,
        units: Arc<Units>,
        states: UnitStates,
        start_tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                server_config,
                router,
                sessions,
                units,
                states,
                start_tasks: Mutex::new(start_tasks),
            }),
        }
    }

    // Transport

    /// Processes transport events in arrival order until the transport closes
    pub async fn listen<R: PacketReceiver>(&self, mut receiver: R) {
        info!("Server listening");
        while let Some(event) = receiver.receive().await {
            self.handle(event);
        }

        info!("Transport closed");
        if self.inner.server_config.disconnect_on_close {
            for session in self.inner.sessions.sessions() {
                if let Err(err) = self.disconnect(session) {
                    warn!("{err}");
                }
            }
        }
    }

    pub fn handle(&self, event: ServerEvent) {
        match event {
            ServerEvent::Connected(session) => {
                if let Err(err) = self.connect(session) {
                    warn!("Ignoring connect: {err}");
                }
            }
            ServerEvent::Disconnected(session) => {
                if let Err(err) = self.disconnect(session) {
                    warn!("Ignoring disconnect: {err}");
                }
            }
            ServerEvent::Packet(session, payload) => self.receive(session, &payload),
        }
    }

    /// Greets a new session: sends the manifest and the effective value of
    /// every property, then runs the session added callbacks
    pub fn connect(&self, session: SessionId) -> Result<(), SessionError> {
        if self.inner.sessions.is_connected(session) {
            return Err(SessionError::AlreadyConnected { session });
        }
        self.inner.router.send_manifest(session);
        self.inner.sessions.open(session)?;
        self.inner.router.greet(session);
        self.inner.sessions.announce(session);
        Ok(())
    }

    /// Runs the session removing callbacks, releases the session's scope,
    /// then forgets its property overrides and observers
    pub fn disconnect(&self, session: SessionId) -> Result<(), SessionError> {
        self.inner.sessions.disconnect(session)?;
        self.inner.router.forget(session);
        Ok(())
    }

    /// Processes one packet from a connected session
    pub fn receive(&self, session: SessionId, payload: &[u8]) {
        if !self.inner.sessions.is_connected(session) {
            warn!("Dropping packet from {session}: not connected");
            return;
        }
        self.inner.router.dispatch(session, payload);
    }

    // Services

    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    pub fn manifest(&self) -> &Manifest {
        self.inner.router.manifest()
    }

    pub fn service<S: Service>(&self) -> Result<Arc<S>, LookupError> {
        self.inner.units.get::<S>()
    }

    pub fn units(&self) -> &Arc<Units> {
        &self.inner.units
    }

    pub fn unit_state(&self, name: &str) -> Option<UnitState> {
        self.inner.states.get(name)
    }

    pub fn unit_states(&self) -> &UnitStates {
        &self.inner.states
    }

    /// Waits until every service's start has returned, successfully or not
    pub async fn join_start_tasks(&self) {
        let tasks = std::mem::take(&mut *self.inner.start_tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }
}
