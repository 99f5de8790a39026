use std::{default::Default, time::Duration};

use tether_shared::MiddlewarePipeline;

/// Contains Config properties which will be used by a Client
#[derive(Clone)]
pub struct ClientConfig {
    /// Interceptors run on every channel this client touches
    pub middleware: MiddlewarePipeline,
    /// How long to wait for the server's manifest after connecting
    pub handshake_timeout: Duration,
    /// How long a method invocation may wait for its response. `None` waits
    /// until the response arrives or the session ends.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            middleware: MiddlewarePipeline::default(),
            handshake_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}
