use std::sync::Arc;

use log::info;
use tokio::runtime::Handle;

use tether_shared::{DependencyScheduler, Extensions, RegistryError, StartupError, UnitRegistry};

use crate::{
    handshake::receive_manifest,
    remote::{ServerLink, ServiceDirectory},
    transport::{ClientEvent, PacketReceiver, PacketSender},
    ClientConfig, ClientHandle, ClientStartError, Controller,
};

/// Collects controllers, then, once connected, runs them in dependency order
/// against the services the server announces
pub struct Client {
    client_config: ClientConfig,
    registry: UnitRegistry,
}

impl Client {
    /// Create a new Client
    pub fn new(client_config: ClientConfig) -> Self {
        Self {
            client_config,
            registry: UnitRegistry::new(),
        }
    }

    pub fn add_controller<C: Controller>(
        &mut self,
        controller: C,
    ) -> Result<&mut Self, RegistryError> {
        self.registry.register(controller)?;
        Ok(self)
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.client_config
    }

    /// Waits for the server's manifest, runs every controller's init in
    /// dependency order, launches their start tasks, then starts processing
    /// packets from the server.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start<P, R>(
        self,
        sender: P,
        mut receiver: R,
    ) -> Result<ClientHandle, ClientStartError>
    where
        P: PacketSender + 'static,
        R: PacketReceiver + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| StartupError::NoRuntime)?;

        let manifest =
            receive_manifest(&mut receiver, self.client_config.handshake_timeout).await?;
        let link = Arc::new(ServerLink::new(
            manifest,
            Arc::new(sender),
            &self.client_config,
        ));
        let directory = ServiceDirectory::new(link.clone());

        let mut extensions = Extensions::new();
        extensions.insert(directory.clone());

        let startup = DependencyScheduler::run(self.registry, Arc::new(extensions))?;
        let (units, states, start_tasks) = startup.into_parts();
        info!("Client started {} controllers", units.len());

        let receive_task = runtime.spawn(receive_loop(link.clone(), receiver));
        Ok(ClientHandle::new(
            link,
            directory,
            units,
            states,
            start_tasks,
            receive_task,
        ))
    }
}

/// Processes packets in arrival order until the session ends
async fn receive_loop<R: PacketReceiver>(link: Arc<ServerLink>, mut receiver: R) {
    while let Some(event) = receiver.receive().await {
        match event {
            ClientEvent::Packet(payload) => link.dispatch(&payload),
            ClientEvent::Disconnected => break,
        }
    }
    link.shutdown();
}
