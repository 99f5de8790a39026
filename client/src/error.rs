use thiserror::Error;

use tether_shared::{ChannelId, CodecError, PayloadError, RemoteError, StartupError, TransportError};

/// Errors raised while waiting for the server's manifest
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("Server did not send its manifest within {millis}ms")]
    Timeout { millis: u128 },

    #[error("Connection closed before the server sent its manifest")]
    Disconnected,

    /// The first packet was something other than a manifest
    #[error("Expected a Manifest packet first, got {packet}")]
    UnexpectedPacket { packet: &'static str },

    #[error("{0}")]
    Codec(#[from] CodecError),
}

/// Errors raised by [`Client::start`](crate::Client::start)
#[derive(Debug, Error)]
pub enum ClientStartError {
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("{0}")]
    Startup(#[from] StartupError),
}

/// Errors raised when resolving a remote handle against the manifest
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Server exposes no service named {unit:?}")]
    UnknownService { unit: String },

    #[error("Server exposes no channel {channel}")]
    UnknownChannel { channel: ChannelId },

    /// The channel exists but is of another kind
    #[error("Channel {channel} is a {found}, not a {expected}")]
    WrongKind {
        channel: ChannelId,
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors raised by client-side signal handles
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The session with the server has ended
    #[error("Session with the server has ended")]
    SessionGone,

    #[error("{0}")]
    Payload(#[from] PayloadError),

    #[error("{0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

/// Outcome of a failed method invocation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// Middleware on either side refused the call
    #[error("Invocation was rejected by middleware")]
    Rejected,

    /// The handler returned an error or panicked
    #[error("Remote handler failed: {0}")]
    Failed(String),

    #[error("Server has no method {0}")]
    UnknownChannel(ChannelId),

    /// The server could not decode the request
    #[error("Server could not decode the request: {0}")]
    BadPayload(String),

    /// The session ended before the response arrived
    #[error("Session with the server has ended")]
    SessionGone,

    #[error("No response within {millis}ms")]
    Timeout { millis: u128 },

    #[error("{0}")]
    Payload(#[from] PayloadError),

    #[error("{0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

impl From<RemoteError> for InvocationError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected => InvocationError::Rejected,
            RemoteError::Failed(message) => InvocationError::Failed(message),
            RemoteError::UnknownChannel(channel) => InvocationError::UnknownChannel(channel),
            RemoteError::BadPayload(message) => InvocationError::BadPayload(message),
        }
    }
}

/// Outcome of a failed [`wait_ready`](crate::ClientProperty::wait_ready)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("Property received no value within {millis}ms")]
    Timeout { millis: u128 },

    /// The session ended before a value arrived
    #[error("Session with the server has ended")]
    SessionGone,

    #[error("{0}")]
    Payload(#[from] PayloadError),
}

impl From<ChannelError> for InvocationError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::SessionGone => InvocationError::SessionGone,
            ChannelError::Payload(err) => InvocationError::Payload(err),
            ChannelError::Codec(err) => InvocationError::Codec(err),
            ChannelError::Transport(err) => InvocationError::Transport(err),
        }
    }
}
