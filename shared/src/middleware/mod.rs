use std::{fmt, sync::Arc};

use log::{debug, error, warn};

use crate::{protocol::Args, types::HostType, unwind::catch_panic, ChannelId, SessionId};

pub mod error;

pub use error::InterceptorError;

/// Which way a message is travelling relative to the host running the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Outcome of an interceptor or of a whole pipeline run
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    Proceed(Args),
    Reject,
}

impl Flow {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Flow::Reject)
    }
}

/// What an interceptor is told about the message it is looking at
#[derive(Clone, Copy, Debug)]
pub struct CallContext<'a> {
    pub host: HostType,
    pub direction: Direction,
    /// The originating session for inbound server traffic, the targeted one
    /// for outbound server traffic. `None` on clients and for broadcasts.
    pub session: Option<SessionId>,
    pub channel: &'a ChannelId,
}

// Interceptor Trait
/// A synchronous step of a [`MiddlewarePipeline`]. Interceptors must not block
/// on I/O: they run on the task delivering the message.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, call: &CallContext<'_>, args: Args) -> Result<Flow, InterceptorError>;
}

impl<F> Interceptor for F
where
    F: Fn(&CallContext<'_>, Args) -> Result<Flow, InterceptorError> + Send + Sync,
{
    fn intercept(&self, call: &CallContext<'_>, args: Args) -> Result<Flow, InterceptorError> {
        self(call, args)
    }
}

/// Two ordered interceptor chains, one per direction
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    inbound: Vec<Arc<dyn Interceptor>>,
    outbound: Vec<Arc<dyn Interceptor>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a closure to the inbound chain
    pub fn inbound<F>(self, interceptor: F) -> Self
    where
        F: Fn(&CallContext<'_>, Args) -> Result<Flow, InterceptorError> + Send + Sync + 'static,
    {
        self.inbound_interceptor(interceptor)
    }

    /// Appends a closure to the outbound chain
    pub fn outbound<F>(self, interceptor: F) -> Self
    where
        F: Fn(&CallContext<'_>, Args) -> Result<Flow, InterceptorError> + Send + Sync + 'static,
    {
        self.outbound_interceptor(interceptor)
    }

    pub fn inbound_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inbound.push(Arc::new(interceptor));
        self
    }

    pub fn outbound_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.outbound.push(Arc::new(interceptor));
        self
    }

    /// A pipeline running every interceptor of `self`, then those of `next`
    pub fn then(&self, next: &MiddlewarePipeline) -> MiddlewarePipeline {
        let mut chained = self.clone();
        chained.inbound.extend(next.inbound.iter().cloned());
        chained.outbound.extend(next.outbound.iter().cloned());
        chained
    }

    pub fn is_empty(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty()
    }

    pub fn run_inbound(
        &self,
        host: HostType,
        session: Option<SessionId>,
        channel: &ChannelId,
        args: Args,
    ) -> Flow {
        let call = CallContext {
            host,
            direction: Direction::Inbound,
            session,
            channel,
        };
        run_chain(&self.inbound, &call, args)
    }

    pub fn run_outbound(
        &self,
        host: HostType,
        target: Option<SessionId>,
        channel: &ChannelId,
        args: Args,
    ) -> Flow {
        let call = CallContext {
            host,
            direction: Direction::Outbound,
            session: target,
            channel,
        };
        run_chain(&self.outbound, &call, args)
    }
}

fn run_chain(chain: &[Arc<dyn Interceptor>], call: &CallContext<'_>, mut args: Args) -> Flow {
    for (index, interceptor) in chain.iter().enumerate() {
        match catch_panic(|| interceptor.intercept(call, args)) {
            Ok(Ok(Flow::Proceed(next))) => args = next,
            Ok(Ok(Flow::Reject)) => {
                debug!(
                    "{:?} middleware #{} rejected {} ({:?})",
                    call.direction, index, call.channel, call.session
                );
                return Flow::Reject;
            }
            Ok(Err(err)) => {
                warn!(
                    "{:?} middleware #{} failed on {}: {}. Dropping message",
                    call.direction, index, call.channel, err
                );
                return Flow::Reject;
            }
            Err(message) => {
                error!(
                    "{:?} middleware #{} panicked on {}: {}. Dropping message",
                    call.direction, index, call.channel, message
                );
                return Flow::Reject;
            }
        }
    }
    Flow::Proceed(args)
}

impl fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .finish()
    }
}
