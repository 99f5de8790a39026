use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use tether_shared::{LookupError, Subscription, UnitState, UnitStates, Units};

use crate::{
    remote::{ServerLink, ServiceDirectory, ServiceHandle},
    Controller, DirectoryError,
};

struct HandleInner {
    link: Arc<ServerLink>,
    directory: ServiceDirectory,
    units: Arc<Units>,
    states: UnitStates,
    start_tasks: Mutex<Vec<JoinHandle<()>>>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

/// A started client, connected to the server until the transport reports
/// otherwise
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<HandleInner>,
}

impl ClientHandle {
    pub(crate) fn new(
        link: Arc<ServerLink>,
        directory: ServiceDirectory,
        units: Arc<Units>,
        states: UnitStates,
        start_tasks: Vec<JoinHandle<()>>,
        receive_task: JoinHandle<()>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                link,
                directory,
                units,
                states,
                start_tasks: Mutex::new(start_tasks),
                receive_task: Mutex::new(Some(receive_task)),
            }),
        }
    }

    pub fn directory(&self) -> &ServiceDirectory {
        &self.inner.directory
    }

    pub fn service(&self, unit: &str) -> Result<ServiceHandle, DirectoryError> {
        self.inner.directory.service(unit)
    }

    pub fn controller<C: Controller>(&self) -> Result<Arc<C>, LookupError> {
        self.inner.units.get::<C>()
    }

    pub fn units(&self) -> &Arc<Units> {
        &self.inner.units
    }

    pub fn unit_state(&self, name: &str) -> Option<UnitState> {
        self.inner.states.get(name)
    }

    pub fn unit_states(&self) -> &UnitStates {
        &self.inner.states
    }

    // Session

    pub fn is_connected(&self) -> bool {
        self.inner.link.is_connected()
    }

    pub fn on_disconnected<F: Fn() + Send + Sync + 'static>(&self, handler: F) -> Subscription {
        self.inner.link.on_disconnected(handler)
    }

    /// Resolves once the session with the server has ended
    pub async fn closed(&self) {
        self.inner.link.closed().await;
    }

    /// Stops processing packets and ends the session locally
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.receive_task.lock().take() {
            task.abort();
        }
        self.inner.link.shutdown();
    }

    /// Waits until every controller's start has returned, successfully or not
    pub async fn join_start_tasks(&self) {
        let tasks = std::mem::take(&mut *self.inner.start_tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }
}
