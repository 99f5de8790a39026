use std::{marker::PhantomData, sync::Arc, time::Duration};

use log::warn;

use tether_shared::{Args, ChannelId, Payload, Subscription};

use super::link::{PropertyCell, Readiness};
use crate::WaitError;

/// Client view of a service's replicated property: the value the server
/// decided this session sees.
///
/// Not ready until the first value arrives.
pub struct ClientProperty<T: Payload> {
    channel: ChannelId,
    cell: Arc<PropertyCell>,
    phantom_t: PhantomData<fn() -> T>,
}

impl<T: Payload> Clone for ClientProperty<T> {
    fn clone(&self) -> Self {
        Self::new(self.channel.clone(), self.cell.clone())
    }
}

impl<T: Payload> ClientProperty<T> {
    pub(crate) fn new(channel: ChannelId, cell: Arc<PropertyCell>) -> Self {
        Self {
            channel,
            cell,
            phantom_t: PhantomData,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// The latest value, `None` until one has arrived
    pub fn get(&self) -> Option<T> {
        let args = self.cell.current()?;
        match args.decode::<T>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Cannot read {}: {err}", self.channel);
                None
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cell.current().is_some()
    }

    /// Calls `handler` on every new value, and right away if the property is
    /// already ready
    pub fn observe<F: Fn(&T) + Send + Sync + 'static>(&self, handler: F) -> Subscription {
        let channel = self.channel.clone();
        self.cell.observe(Arc::new(move |args: &Args| match args.decode::<T>() {
            Ok(value) => handler(&value),
            Err(err) => warn!("Dropping {channel} update: {err}"),
        }))
    }

    /// Resolves with the value once the property is ready.
    ///
    /// Resolves to [`WaitError::SessionGone`] as soon as the session ends,
    /// without waiting out `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<T, WaitError> {
        let mut readiness = self.cell.subscribe();
        let ready = async {
            loop {
                if let Some(args) = self.cell.current() {
                    return Ok(args);
                }
                let state = *readiness.borrow_and_update();
                match state {
                    Readiness::Gone => return Err(WaitError::SessionGone),
                    Readiness::Ready => continue,
                    Readiness::Pending => {}
                }
                if readiness.changed().await.is_err() {
                    return Err(WaitError::SessionGone);
                }
            }
        };

        let args = tokio::time::timeout(timeout, ready)
            .await
            .map_err(|_| WaitError::Timeout {
                millis: timeout.as_millis(),
            })??;
        Ok(args.decode::<T>()?)
    }
}
