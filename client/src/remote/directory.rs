use std::sync::Arc;

use tether_shared::{ChannelId, ChannelKind, Manifest, Payload, Subscription};

use super::{ClientMethod, ClientProperty, ClientSignal, ServerLink};
use crate::DirectoryError;

// ServiceDirectory
/// Resolves the services the server announced in its manifest.
///
/// Available to controllers as an extension of their init and start
/// contexts.
#[derive(Clone)]
pub struct ServiceDirectory {
    link: Arc<ServerLink>,
}

impl ServiceDirectory {
    pub(crate) fn new(link: Arc<ServerLink>) -> Self {
        Self { link }
    }

    pub fn manifest(&self) -> &Manifest {
        self.link.manifest()
    }

    pub fn service(&self, unit: &str) -> Result<ServiceHandle, DirectoryError> {
        if !self.link.manifest().has_unit(unit) {
            return Err(DirectoryError::UnknownService {
                unit: unit.to_string(),
            });
        }
        Ok(ServiceHandle {
            unit: unit.to_string(),
            link: self.link.clone(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Called once, when the session with the server ends
    pub fn on_disconnected<F: Fn() + Send + Sync + 'static>(&self, handler: F) -> Subscription {
        self.link.on_disconnected(handler)
    }
}

// ServiceHandle
/// One service's channels, as typed handles
#[derive(Clone)]
pub struct ServiceHandle {
    unit: String,
    link: Arc<ServerLink>,
}

impl ServiceHandle {
    pub fn name(&self) -> &str {
        &self.unit
    }

    /// Names and kinds of every channel of this service
    pub fn channels(&self) -> Vec<(String, ChannelKind)> {
        self.link
            .manifest()
            .channels(&self.unit)
            .map(|(name, kind)| (name.to_string(), kind))
            .collect()
    }

    pub fn signal<T: Payload>(&self, name: &str) -> Result<ClientSignal<T>, DirectoryError> {
        let (channel, kind) = self.lookup(name)?;
        match kind {
            ChannelKind::Signal(delivery) => {
                Ok(ClientSignal::new(channel, delivery, self.link.clone()))
            }
            other => Err(wrong_kind(channel, "Signal", other)),
        }
    }

    pub fn property<T: Payload>(&self, name: &str) -> Result<ClientProperty<T>, DirectoryError> {
        let (channel, kind) = self.lookup(name)?;
        if kind != ChannelKind::Property {
            return Err(wrong_kind(channel, "Property", kind));
        }
        match self.link.property(&channel) {
            Some(cell) => Ok(ClientProperty::new(channel, cell)),
            None => Err(DirectoryError::UnknownChannel { channel }),
        }
    }

    pub fn method<Q: Payload, R: Payload>(
        &self,
        name: &str,
    ) -> Result<ClientMethod<Q, R>, DirectoryError> {
        let (channel, kind) = self.lookup(name)?;
        if kind != ChannelKind::Method {
            return Err(wrong_kind(channel, "Method", kind));
        }
        Ok(ClientMethod::new(channel, self.link.clone()))
    }

    fn lookup(&self, name: &str) -> Result<(ChannelId, ChannelKind), DirectoryError> {
        let channel = ChannelId::new(self.unit.as_str(), name);
        match self.link.manifest().kind(&channel) {
            Some(kind) => Ok((channel, kind)),
            None => Err(DirectoryError::UnknownChannel { channel }),
        }
    }
}

fn wrong_kind(channel: ChannelId, expected: &'static str, found: ChannelKind) -> DirectoryError {
    DirectoryError::WrongKind {
        channel,
        expected,
        found: found.name(),
    }
}
