mod directory;
mod link;
mod method;
mod property;
mod signal;

pub use directory::{ServiceDirectory, ServiceHandle};
pub(crate) use link::ServerLink;
pub use method::ClientMethod;
pub use property::ClientProperty;
pub use signal::ClientSignal;
