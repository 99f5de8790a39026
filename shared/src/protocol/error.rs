use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ChannelId;

/// Errors that can occur while encoding or decoding a packet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Packet could not be serialized
    #[error("Failed to encode packet: {reason}")]
    Encode { reason: String },

    /// Incoming bytes are not a valid packet
    #[error("Failed to decode {len} byte packet: {reason}")]
    Decode { len: usize, reason: String },
}

/// Errors that can occur while converting between typed payloads and [`Args`](super::Args)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Typed value could not be turned into an argument
    #[error("Failed to encode payload: {reason}")]
    Encode { reason: String },

    /// Argument could not be turned back into the expected type
    #[error("Failed to decode payload as {type_name}: {reason}")]
    Decode {
        type_name: &'static str,
        reason: String,
    },

    /// Typed channels carry exactly one argument
    #[error("Expected {expected} argument(s), found {found}")]
    ArgumentCount { expected: usize, found: usize },
}

/// Structured failure returned to the caller of a remote method
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RemoteError {
    /// Middleware refused the request before the handler ran
    #[error("Request was rejected by middleware")]
    Rejected,

    /// The handler returned an error or panicked
    #[error("Method handler failed: {0}")]
    Failed(String),

    /// No method of that name is exposed
    #[error("No method {0} is exposed by the server")]
    UnknownChannel(ChannelId),

    /// The request arguments did not match the handler's request type
    #[error("Request payload could not be decoded: {0}")]
    BadPayload(String),
}
