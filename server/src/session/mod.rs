use std::fmt;

use tether_shared::{ResourceScope, SessionId};

mod manager;

pub use manager::SessionManager;

// EntityId
/// Opaque identity of the in-world entity a session currently controls
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Handed to session added / removing callbacks
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub session: SessionId,
    /// Released right after the session's removing callbacks have run
    pub scope: ResourceScope,
}

/// Handed to entity added / removing callbacks
#[derive(Clone, Debug)]
pub struct EntityContext {
    pub session: SessionId,
    pub entity: EntityId,
    /// Released when the entity is unbound or the session disconnects
    pub scope: ResourceScope,
}
