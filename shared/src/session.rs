use std::fmt;

use serde::{Deserialize, Serialize};

// SessionId
/// Opaque identifier of one connected peer. Assigned by the transport, never
/// read from a packet payload.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn from_u64(value: u64) -> Self {
        SessionId(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}
