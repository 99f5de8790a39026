use thiserror::Error;

use crate::SessionId;

/// Errors reported by a transport when handing off a packet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The session has no open channel on this transport
    #[error("No open channel for {session}. The peer may have disconnected")]
    SessionClosed { session: SessionId },

    /// The connection to the remote host is gone
    #[error("Connection to the remote host is closed")]
    ConnectionClosed,

    /// Transport-specific failure
    #[error("Transport failed to send {len} bytes: {reason}")]
    SendFailed { len: usize, reason: String },
}
