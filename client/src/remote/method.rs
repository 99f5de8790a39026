use std::{marker::PhantomData, sync::Arc};

use tether_shared::{Args, ChannelId, Payload};

use super::ServerLink;
use crate::InvocationError;

/// Client end of a method exposed by a service
pub struct ClientMethod<Q: Payload, R: Payload> {
    channel: ChannelId,
    link: Arc<ServerLink>,
    phantom_q: PhantomData<fn(Q)>,
    phantom_r: PhantomData<fn() -> R>,
}

impl<Q: Payload, R: Payload> Clone for ClientMethod<Q, R> {
    fn clone(&self) -> Self {
        Self::new(self.channel.clone(), self.link.clone())
    }
}

impl<Q: Payload, R: Payload> ClientMethod<Q, R> {
    pub(crate) fn new(channel: ChannelId, link: Arc<ServerLink>) -> Self {
        Self {
            channel,
            link,
            phantom_q: PhantomData,
            phantom_r: PhantomData,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Sends `request` and waits for the server's answer.
    ///
    /// Fails fast with [`InvocationError::SessionGone`] once the session has
    /// ended, and resolves to it if the session ends while waiting.
    pub async fn invoke(&self, request: &Q) -> Result<R, InvocationError> {
        let args = Args::encode(request)?;
        let response = self.link.invoke(&self.channel, args).await?;
        Ok(response.decode::<R>()?)
    }
}
