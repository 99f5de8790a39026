use thiserror::Error;

use tether_shared::{CodecError, PayloadError, SessionId, TransportError};

/// Errors raised by server-side remote channel handles
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The handle was never exposed through a service's client table
    #[error("Remote channel is not exposed by any registered service")]
    Unbound,

    /// The handle is exposed but the server has not been started yet
    #[error("Remote channels cannot send before the server is started")]
    NotStarted,

    /// Target session is not (or no longer) connected
    #[error("{session} is not connected")]
    SessionNotConnected { session: SessionId },

    #[error("{0}")]
    Payload(#[from] PayloadError),

    #[error("{0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

/// Errors raised by the [`SessionManager`](crate::SessionManager)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The transport reported a connect for a session that is already open
    #[error("{session} is already connected")]
    AlreadyConnected { session: SessionId },

    /// The session is not connected
    #[error("{session} is not connected")]
    NotConnected { session: SessionId },
}
