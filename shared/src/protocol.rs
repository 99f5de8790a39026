use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{transport::Delivery, types::RequestId};

pub mod args;
pub mod error;

pub use args::{Args, Payload};
pub use error::{CodecError, PayloadError, RemoteError};

/// Identity of one exposed channel: the owning unit plus the channel name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    pub unit: String,
    pub name: String,
}

impl ChannelId {
    pub fn new(unit: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unit, self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Signal(Delivery),
    Property,
    Method,
}

impl ChannelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Signal(_) => "Signal",
            ChannelKind::Property => "Property",
            ChannelKind::Method => "Method",
        }
    }
}

// Manifest
/// Every channel the server exposes, grouped by unit. Sent to each session
/// right after it connects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    units: BTreeMap<String, BTreeMap<String, ChannelKind>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a unit, even one exposing no channels
    pub fn add_unit(&mut self, unit: &str) {
        self.units.entry(unit.to_string()).or_default();
    }

    pub fn insert(&mut self, channel: &ChannelId, kind: ChannelKind) -> Option<ChannelKind> {
        self.units
            .entry(channel.unit.clone())
            .or_default()
            .insert(channel.name.clone(), kind)
    }

    pub fn kind(&self, channel: &ChannelId) -> Option<ChannelKind> {
        self.units
            .get(&channel.unit)
            .and_then(|channels| channels.get(&channel.name))
            .copied()
    }

    pub fn has_unit(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn channels<'m>(&'m self, unit: &str) -> impl Iterator<Item = (&'m str, ChannelKind)> {
        self.units
            .get(unit)
            .into_iter()
            .flat_map(|channels| channels.iter().map(|(name, kind)| (name.as_str(), *kind)))
    }

    pub fn channel_count(&self) -> usize {
        self.units.values().map(BTreeMap::len).sum()
    }
}

// Packet
/// Everything that crosses the transport between a client and the server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Server -> Client, first packet of every session
    Manifest(Manifest),
    /// Either direction
    Signal { channel: ChannelId, args: Args },
    /// Server -> Client, the effective value for the receiving session
    Property { channel: ChannelId, args: Args },
    /// Client -> Server
    Request {
        id: RequestId,
        channel: ChannelId,
        args: Args,
    },
    /// Server -> Client, answers exactly one Request
    Response {
        id: RequestId,
        result: Result<Args, RemoteError>,
    },
}

impl Packet {
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Manifest(_) => "Manifest",
            Packet::Signal { .. } => "Signal",
            Packet::Property { .. } => "Property",
            Packet::Request { .. } => "Request",
            Packet::Response { .. } => "Response",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|err| CodecError::Encode {
            reason: err.to_string(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|err| CodecError::Decode {
            len: bytes.len(),
            reason: err.to_string(),
        })
    }
}
