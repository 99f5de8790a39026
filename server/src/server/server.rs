use std::sync::Arc;

use log::info;
use tokio::runtime::Handle;

use tether_shared::{
    DependencyScheduler, Extensions, Manifest, RegistryError, StartupError, UnitRegistry,
};

use crate::{
    remote::{Outbox, RemoteRouter, RouteTable},
    transport::PacketSender,
    ClientTable, ServerConfig, ServerHandle, Service, SessionManager,
};

/// Collects services, then starts them in dependency order and exposes their
/// client tables to connecting sessions
pub struct Server {
    server_config: ServerConfig,
    registry: UnitRegistry,
    routes: RouteTable,
    outbox: Arc<Outbox>,
    sessions: SessionManager,
}

impl Server {
    /// Create a new Server
    pub fn new(server_config: ServerConfig) -> Self {
        let sessions = SessionManager::new();
        let outbox = Arc::new(Outbox::new(sessions.clone()));

        Self {
            server_config,
            registry: UnitRegistry::new(),
            routes: RouteTable::new(outbox.clone()),
            outbox,
            sessions,
        }
    }

    /// Registers a service and binds the channels of its client table
    pub fn add_service<S: Service>(&mut self, service: S) -> Result<&mut Self, RegistryError> {
        let name = service.name().to_string();
        if self.registry.contains(&name) {
            return Err(RegistryError::DuplicateUnit { name });
        }

        let mut table = ClientTable::<S>::new(&name);
        service.client(&mut table);
        let (entries, middleware) = table.into_parts();
        let pipeline = self.server_config.middleware.then(&middleware);
        self.routes.expose(&name, entries, pipeline)?;

        self.registry.register(service)?;
        Ok(self)
    }

    /// Manages the sessions of this server. Also available to services as
    /// an extension of their init and start contexts.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Every channel exposed so far
    pub fn manifest(&self) -> &Manifest {
        self.routes.manifest()
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.server_config
    }

    /// Runs every service's init in dependency order, launches their start
    /// tasks, and returns the handle that feeds transport events in.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<P: PacketSender + 'static>(
        self,
        sender: P,
    ) -> Result<ServerHandle, StartupError> {
        let runtime = Handle::try_current().map_err(|_| StartupError::NoRuntime)?;
        self.outbox.attach(Arc::new(sender));

        let mut extensions = Extensions::new();
        extensions.insert(self.sessions.clone());

        let startup = DependencyScheduler::run(self.registry, Arc::new(extensions))?;
        let (units, states, start_tasks) = startup.into_parts();
        info!(
            "Server started {} services exposing {} channels",
            units.len(),
            self.routes.manifest().channel_count()
        );

        let router = RemoteRouter::new(self.routes, units.clone(), runtime);
        Ok(ServerHandle::new(
            self.server_config,
            router,
            self.sessions,
            units,
            states,
            start_tasks,
        ))
    }
}
