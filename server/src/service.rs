use std::{future::Future, marker::PhantomData, sync::Arc};

use tether_shared::{BoxError, MiddlewarePipeline, Payload, SessionId, Unit};

use crate::remote::{erase_method, Endpoint, RemoteProperty, RemoteSignal};

// Service Trait
/// A server-side [`Unit`] that may expose channels to clients.
///
/// ```ignore
/// impl Service for PointsService {
///     fn client(&self, table: &mut ClientTable<Self>) {
///         table
///             .signal("PointsChanged", &self.points_changed)
///             .property("Points", &self.points)
///             .method("GetPoints", |service: Arc<Self>, session, _: ()| async move {
///                 Ok::<_, BoxError>(service.points.get_for(session))
///             });
///     }
/// }
/// ```
pub trait Service: Unit + Sized {
    /// Declares what clients can reach. Called once, when the service is
    /// added to the server.
    fn client(&self, _table: &mut ClientTable<Self>) {}
}

// ClientTable
/// The channels a service exposes, by name, plus middleware run only for
/// those channels
pub struct ClientTable<S> {
    unit: String,
    entries: Vec<(String, Endpoint)>,
    middleware: MiddlewarePipeline,
    phantom_s: PhantomData<fn() -> S>,
}

impl<S: Service> ClientTable<S> {
    pub(crate) fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            entries: Vec::new(),
            middleware: MiddlewarePipeline::new(),
            phantom_s: PhantomData,
        }
    }

    pub fn unit_name(&self) -> &str {
        &self.unit
    }

    pub fn signal<T: Payload>(&mut self, name: &str, signal: &RemoteSignal<T>) -> &mut Self {
        self.entries.push((name.to_string(), signal.endpoint()));
        self
    }

    pub fn property<T: Payload>(&mut self, name: &str, property: &RemoteProperty<T>) -> &mut Self {
        self.entries.push((name.to_string(), property.endpoint()));
        self
    }

    /// Exposes an async request handler. It gets the service instance, the
    /// calling session and the decoded request; an `Err` reaches the caller
    /// as a failure carrying the error's message.
    pub fn method<Q, R, E, F, Fut>(&mut self, name: &str, handler: F) -> &mut Self
    where
        Q: Payload,
        R: Payload,
        E: Into<BoxError>,
        F: Fn(Arc<S>, SessionId, Q) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.entries
            .push((name.to_string(), Endpoint::Method(erase_method(handler))));
        self
    }

    /// Appends interceptors run after the server-wide middleware, for this
    /// service's channels only
    pub fn middleware(&mut self, pipeline: MiddlewarePipeline) -> &mut Self {
        self.middleware = self.middleware.then(&pipeline);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<(String, Endpoint)>, MiddlewarePipeline) {
        (self.entries, self.middleware)
    }
}
