use std::{marker::PhantomData, sync::Arc};

use log::warn;

use tether_shared::{Args, ChannelId, Delivery, Packet, Payload, Subscription};

use super::ServerLink;
use crate::ChannelError;

/// Client end of a signal exposed by a service
pub struct ClientSignal<T: Payload> {
    channel: ChannelId,
    delivery: Delivery,
    link: Arc<ServerLink>,
    phantom_t: PhantomData<fn(T)>,
}

impl<T: Payload> Clone for ClientSignal<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            delivery: self.delivery,
            link: self.link.clone(),
            phantom_t: PhantomData,
        }
    }
}

impl<T: Payload> ClientSignal<T> {
    pub(crate) fn new(channel: ChannelId, delivery: Delivery, link: Arc<ServerLink>) -> Self {
        Self {
            channel,
            delivery,
            link,
            phantom_t: PhantomData,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Fires to the server. A fire rejected by outbound middleware is
    /// silently dropped.
    pub fn fire(&self, payload: &T) -> Result<(), ChannelError> {
        if !self.link.is_connected() {
            return Err(ChannelError::SessionGone);
        }
        let args = Args::encode(payload)?;
        let Some(args) = self.link.outbound(&self.channel, args) else {
            return Ok(());
        };
        let packet = Packet::Signal {
            channel: self.channel.clone(),
            args,
        };
        self.link.send(self.delivery, &packet)
    }

    /// Calls `handler` for every fire from the server that passed the
    /// inbound middleware
    pub fn connect<F: Fn(&T) + Send + Sync + 'static>(&self, handler: F) -> Subscription {
        let channel = self.channel.clone();
        self.link
            .signal_listeners(&self.channel)
            .connect(move |args: &Args| match args.decode::<T>() {
                Ok(payload) => handler(&payload),
                Err(err) => warn!("Dropping {channel} fire: {err}"),
            })
    }
}
