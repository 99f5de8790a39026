use std::default::Default;

use tether_shared::MiddlewarePipeline;

/// Contains Config properties which will be used by the Server
#[derive(Clone)]
pub struct ServerConfig {
    /// Interceptors run on every exposed channel, before the middleware a
    /// service declares in its client table
    pub middleware: MiddlewarePipeline,
    /// Disconnect every remaining session once the transport reports it is
    /// closed
    pub disconnect_on_close: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            middleware: MiddlewarePipeline::default(),
            disconnect_on_close: true,
        }
    }
}
