//! # Tether Client
//! Runs Controllers in dependency order once the server has announced its
//! services, and reaches those services through typed signal, property and
//! method handles.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod transport;
pub mod shared {
    pub use tether_shared::{
        async_trait, Args, BoxError, CallContext, ChannelId, ChannelKind, Delivery, Flow,
        InitContext, InterceptorError, LookupError, Manifest, MiddlewarePipeline, Payload,
        ResourceScope, StartContext, StartupError, Subscription, Unit, UnitState,
    };
}

mod client;
mod controller;
mod error;
mod handshake;
mod remote;

pub use client::{Client, ClientConfig, ClientHandle};
pub use controller::Controller;
pub use error::{
    ChannelError, ClientStartError, DirectoryError, HandshakeError, InvocationError, WaitError,
};
pub use remote::{ClientMethod, ClientProperty, ClientSignal, ServiceDirectory, ServiceHandle};
