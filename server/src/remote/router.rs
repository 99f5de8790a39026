use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::{debug, warn};
use tokio::runtime::Handle;

use tether_shared::{
    Args, ChannelId, Delivery, Manifest, MiddlewarePipeline, Packet, RegistryError, RemoteError,
    RequestId, SessionId, Units,
};

use super::{method, Binding, Endpoint, Outbox};

struct Route {
    binding: Arc<Binding>,
    endpoint: Endpoint,
}

// RouteTable
/// Collects the client tables of every service while the server is being
/// built
pub(crate) struct RouteTable {
    routes: HashMap<ChannelId, Route>,
    manifest: Manifest,
    outbox: Arc<Outbox>,
}

impl RouteTable {
    pub fn new(outbox: Arc<Outbox>) -> Self {
        Self {
            routes: HashMap::new(),
            manifest: Manifest::new(),
            outbox,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Binds every entry of a service's client table to the network
    pub fn expose(
        &mut self,
        unit: &str,
        entries: Vec<(String, Endpoint)>,
        pipeline: MiddlewarePipeline,
    ) -> Result<(), RegistryError> {
        let mut names = HashSet::new();
        for (name, endpoint) in &entries {
            if !names.insert(name.as_str()) {
                return Err(RegistryError::DuplicateChannel {
                    unit: unit.to_string(),
                    channel: name.clone(),
                });
            }
            if endpoint.is_bound() {
                return Err(RegistryError::AlreadyBound {
                    unit: unit.to_string(),
                    channel: name.clone(),
                });
            }
        }

        self.manifest.add_unit(unit);
        for (name, endpoint) in entries {
            let channel = ChannelId::new(unit, name.as_str());
            let binding = Arc::new(Binding {
                channel: channel.clone(),
                pipeline: pipeline.clone(),
                outbox: self.outbox.clone(),
            });
            if !endpoint.bind(binding.clone()) {
                return Err(RegistryError::AlreadyBound {
                    unit: unit.to_string(),
                    channel: name,
                });
            }
            debug!("Exposing {} {channel}", endpoint.kind().name());
            self.manifest.insert(&channel, endpoint.kind());
            self.routes.insert(channel, Route { binding, endpoint });
        }
        Ok(())
    }
}

// RemoteRouter
/// Turns packets from sessions into signal emissions and method calls, and
/// greets sessions as they connect
pub(crate) struct RemoteRouter {
    routes: HashMap<ChannelId, Route>,
    manifest: Manifest,
    outbox: Arc<Outbox>,
    units: Arc<Units>,
    runtime: Handle,
}

impl RemoteRouter {
    pub fn new(table: RouteTable, units: Arc<Units>, runtime: Handle) -> Self {
        Self {
            routes: table.routes,
            manifest: table.manifest,
            outbox: table.outbox,
            units,
            runtime,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The manifest must be the first packet a session receives
    pub fn send_manifest(&self, session: SessionId) {
        let packet = Packet::Manifest(self.manifest.clone());
        if let Err(err) = self.outbox.send(session, Delivery::Reliable, &packet) {
            warn!("Failed to send manifest to {session}: {err}");
        }
    }

    /// Pushes every property's effective value to a session
    pub fn greet(&self, session: SessionId) {
        for route in self.routes.values() {
            if let Endpoint::Property(property) = &route.endpoint {
                property.greet(session);
            }
        }
    }

    pub fn forget(&self, session: SessionId) {
        for route in self.routes.values() {
            if let Endpoint::Property(property) = &route.endpoint {
                property.forget(session);
            }
        }
    }

    pub fn dispatch(&self, session: SessionId, bytes: &[u8]) {
        let packet = match Packet::from_bytes(bytes) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("Dropping packet from {session}: {err}");
                return;
            }
        };

        match packet {
            Packet::Signal { channel, args } => self.dispatch_signal(session, channel, args),
            Packet::Request { id, channel, args } => {
                self.dispatch_request(session, id, channel, args)
            }
            other => warn!(
                "Dropping {} packet from {session}: clients never send those",
                other.name()
            ),
        }
    }

    fn dispatch_signal(&self, session: SessionId, channel: ChannelId, args: Args) {
        let Some(route) = self.routes.get(&channel) else {
            warn!("{session} fired unknown channel {channel}");
            return;
        };
        let Endpoint::Signal { inbox, .. } = &route.endpoint else {
            warn!("{session} fired {channel}, which is not a signal");
            return;
        };
        let Some(args) = route.binding.inbound(session, args) else {
            return;
        };
        if let Err(err) = inbox.deliver(session, args) {
            warn!("Dropping {channel} fire from {session}: {err}");
        }
    }

    fn dispatch_request(&self, session: SessionId, id: RequestId, channel: ChannelId, args: Args) {
        let route = match self.routes.get(&channel) {
            Some(Route {
                binding,
                endpoint: Endpoint::Method(handler),
            }) => Some((binding.clone(), handler.clone())),
            _ => None,
        };
        let Some((binding, handler)) = route else {
            warn!("{session} invoked unknown method {channel}");
            self.respond(session, id, Err(RemoteError::UnknownChannel(channel)));
            return;
        };

        let Some(args) = binding.inbound(session, args) else {
            self.respond(session, id, Err(RemoteError::Rejected));
            return;
        };
        let Some(service) = self.units.get_any(&channel.unit) else {
            self.respond(
                session,
                id,
                Err(RemoteError::Failed(format!("service {} is not running", channel.unit))),
            );
            return;
        };

        // the receive loop never waits on a handler
        self.runtime.spawn(async move {
            let result = method::invoke(handler, service, session, args)
                .await
                .and_then(|response| {
                    binding
                        .outbound(Some(session), response)
                        .ok_or(RemoteError::Rejected)
                });
            if let Err(err) = &result {
                debug!("{} for {session} failed: {err}", binding.channel);
            }
            let packet = Packet::Response { id, result };
            if let Err(err) = binding.send(session, Delivery::Reliable, &packet) {
                warn!("Failed to answer {} for {session}: {err}", binding.channel);
            }
        });
    }

    fn respond(&self, session: SessionId, id: RequestId, result: Result<Args, RemoteError>) {
        let packet = Packet::Response { id, result };
        if let Err(err) = self.outbox.send(session, Delivery::Reliable, &packet) {
            warn!("Failed to answer request from {session}: {err}");
        }
    }
}
