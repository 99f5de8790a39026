//! # Tether Server
//! Runs Services in dependency order and exposes the signals, properties and
//! methods of their client tables to connected sessions, with per-session
//! state and cleanup tied to each session's lifetime.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod transport;
pub mod shared {
    pub use tether_shared::{
        async_trait, Args, BoxError, CallContext, ChannelId, Delivery, Direction, Flow, InitContext,
        InterceptorError, LookupError, MiddlewarePipeline, Payload, RemoteError, ResourceScope,
        SessionId, StartContext, StartupError, Subscription, Unit, UnitState,
    };
}

mod error;
mod remote;
mod server;
mod service;
mod session;

pub use error::{ChannelError, SessionError};
pub use remote::{RemoteProperty, RemoteSignal};
pub use server::{Server, ServerConfig, ServerHandle};
pub use service::{ClientTable, Service};
pub use session::{EntityContext, EntityId, SessionContext, SessionManager};
