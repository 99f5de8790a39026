//! # Tether Shared
//! Common functionality shared between tether-server & tether-client crates:
//! scoped cleanup, listener lists, the middleware pipeline, the wire protocol
//! and the dependency-ordered unit lifecycle.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod middleware;
mod protocol;
mod scope;
mod session;
mod subscription;
mod transport;
mod types;
mod unit;
mod unwind;

pub use middleware::{
    CallContext, Direction, Flow, Interceptor, InterceptorError, MiddlewarePipeline,
};
pub use protocol::{
    Args, ChannelId, ChannelKind, CodecError, Manifest, Packet, Payload, PayloadError,
    RemoteError,
};
pub use scope::{EntryKey, ResourceScope};
pub use session::SessionId;
pub use subscription::{Listeners, Snapshot, Subscription};
pub use transport::{error::TransportError, Delivery, LinkConditionerConfig};
pub use types::{HostType, RequestId};
pub use unit::{
    resolve, AsAnyArc, BoxError, DependencyScheduler, Extensions, InitContext, LookupError,
    RegistryError, ScheduleError, StartContext, Startup, StartupError, Unit, UnitDescriptor,
    UnitRegistry, UnitState, UnitStates, Units,
};
pub use unwind::{catch_panic, panic_message};

pub use async_trait::async_trait;
