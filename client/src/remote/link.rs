use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{debug, error, info, trace, warn};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::{oneshot, watch};

use tether_shared::{
    catch_panic, Args, ChannelId, ChannelKind, Delivery, Flow, HostType, Listeners, Manifest,
    MiddlewarePipeline, Packet, RequestId, Subscription,
};

use crate::{transport::PacketSender, ChannelError, ClientConfig, InvocationError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Readiness {
    Pending,
    Ready,
    Gone,
}

// PropertyCell
/// Last value pushed for one property channel, untyped
pub(crate) struct PropertyCell {
    // held across an update and its observer calls
    notify: ReentrantMutex<()>,
    value: Mutex<Option<Args>>,
    observers: Listeners<Args>,
    readiness: watch::Sender<Readiness>,
}

impl PropertyCell {
    fn new() -> Self {
        let (readiness, _) = watch::channel(Readiness::Pending);
        Self {
            notify: ReentrantMutex::new(()),
            value: Mutex::new(None),
            observers: Listeners::new(),
            readiness,
        }
    }

    pub fn current(&self) -> Option<Args> {
        self.value.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Connects `handler`, calling it right away if a value already arrived
    pub fn observe(&self, handler: Arc<dyn Fn(&Args) + Send + Sync>) -> Subscription {
        let _guard = self.notify.lock();
        let listener = handler.clone();
        let subscription = self.observers.connect(move |args| listener(args));
        if let Some(current) = self.current() {
            if let Err(message) = catch_panic(|| handler(&current)) {
                error!("Property observer panicked on its first call: {message}");
            }
        }
        subscription
    }

    fn update(&self, args: Args) {
        let _guard = self.notify.lock();
        *self.value.lock() = Some(args.clone());
        self.readiness.send_replace(Readiness::Ready);
        self.observers.emit(&args);
    }

    fn close(&self) {
        self.readiness.send_replace(Readiness::Gone);
    }
}

struct PendingCall {
    channel: ChannelId,
    reply: oneshot::Sender<Result<Args, InvocationError>>,
}

// ServerLink
/// The client's end of its session: outgoing sends, in-flight requests, and
/// the listeners of every channel
pub(crate) struct ServerLink {
    manifest: Manifest,
    sender: Arc<dyn PacketSender>,
    pipeline: MiddlewarePipeline,
    request_timeout: Option<Duration>,
    next_request: AtomicU64,
    pending: Mutex<HashMap<RequestId, PendingCall>>,
    signals: Mutex<HashMap<ChannelId, Listeners<Args>>>,
    properties: HashMap<ChannelId, Arc<PropertyCell>>,
    connected: watch::Sender<bool>,
    disconnected: Listeners<()>,
}

impl ServerLink {
    pub fn new(manifest: Manifest, sender: Arc<dyn PacketSender>, config: &ClientConfig) -> Self {
        let mut properties = HashMap::new();
        for unit in manifest.units() {
            for (name, kind) in manifest.channels(unit) {
                if kind == ChannelKind::Property {
                    properties.insert(ChannelId::new(unit, name), Arc::new(PropertyCell::new()));
                }
            }
        }
        let (connected, _) = watch::channel(true);

        Self {
            manifest,
            sender,
            pipeline: config.middleware.clone(),
            request_timeout: config.request_timeout,
            next_request: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            signals: Mutex::new(HashMap::new()),
            properties,
            connected,
            disconnected: Listeners::new(),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub async fn closed(&self) {
        let mut connected = self.connected.subscribe();
        while *connected.borrow_and_update() {
            if connected.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn on_disconnected<F: Fn() + Send + Sync + 'static>(&self, handler: F) -> Subscription {
        self.disconnected.connect(move |_| handler())
    }

    // Middleware

    pub fn outbound(&self, channel: &ChannelId, args: Args) -> Option<Args> {
        match self
            .pipeline
            .run_outbound(HostType::Client, None, channel, args)
        {
            Flow::Proceed(args) => Some(args),
            Flow::Reject => None,
        }
    }

    fn inbound(&self, channel: &ChannelId, args: Args) -> Option<Args> {
        match self
            .pipeline
            .run_inbound(HostType::Client, None, channel, args)
        {
            Flow::Proceed(args) => Some(args),
            Flow::Reject => None,
        }
    }

    // Outgoing

    pub fn send(&self, delivery: Delivery, packet: &Packet) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::SessionGone);
        }
        let bytes = packet.to_bytes()?;
        trace!("Sending {} packet ({} bytes)", packet.name(), bytes.len());
        self.sender.send(delivery, &bytes)?;
        Ok(())
    }

    /// Sends a request and waits for its response, the session's end, or the
    /// configured request timeout, whichever comes first
    pub async fn invoke(&self, channel: &ChannelId, args: Args) -> Result<Args, InvocationError> {
        let Some(args) = self.outbound(channel, args) else {
            return Err(InvocationError::Rejected);
        };

        let id = RequestId::new(self.next_request.fetch_add(1, Ordering::Relaxed));
        let (reply, response) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            // checked under the lock shutdown drains with
            if !self.is_connected() {
                return Err(InvocationError::SessionGone);
            }
            pending.insert(
                id,
                PendingCall {
                    channel: channel.clone(),
                    reply,
                },
            );
        }

        let packet = Packet::Request {
            id,
            channel: channel.clone(),
            args,
        };
        if let Err(err) = self.send(Delivery::Reliable, &packet) {
            self.pending.lock().remove(&id);
            return Err(err.into());
        }

        let outcome = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, response).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.lock().remove(&id);
                    return Err(InvocationError::Timeout {
                        millis: limit.as_millis(),
                    });
                }
            },
            None => response.await,
        };
        outcome.unwrap_or(Err(InvocationError::SessionGone))
    }

    // Incoming

    pub fn signal_listeners(&self, channel: &ChannelId) -> Listeners<Args> {
        self.signals
            .lock()
            .entry(channel.clone())
            .or_default()
            .clone()
    }

    pub fn property(&self, channel: &ChannelId) -> Option<Arc<PropertyCell>> {
        self.properties.get(channel).cloned()
    }

    pub fn dispatch(&self, bytes: &[u8]) {
        let packet = match Packet::from_bytes(bytes) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("Dropping packet from the server: {err}");
                return;
            }
        };

        match packet {
            Packet::Signal { channel, args } => {
                let Some(args) = self.inbound(&channel, args) else {
                    return;
                };
                let listeners = self.signals.lock().get(&channel).cloned();
                match listeners {
                    Some(listeners) => listeners.emit(&args),
                    None => trace!("Nobody listens to {channel}"),
                }
            }
            Packet::Property { channel, args } => {
                let Some(cell) = self.properties.get(&channel) else {
                    warn!("Server pushed unknown property {channel}");
                    return;
                };
                if let Some(args) = self.inbound(&channel, args) {
                    cell.update(args);
                }
            }
            Packet::Response { id, result } => {
                let Some(call) = self.pending.lock().remove(&id) else {
                    debug!("Response to request {} arrived after its caller gave up", id.to_u64());
                    return;
                };
                let result = match result {
                    Ok(args) => self
                        .inbound(&call.channel, args)
                        .ok_or(InvocationError::Rejected),
                    Err(err) => Err(err.into()),
                };
                let _ = call.reply.send(result);
            }
            Packet::Manifest(_) => warn!("Ignoring repeated manifest"),
            Packet::Request { channel, .. } => {
                warn!("Ignoring request for {channel}: clients do not serve methods")
            }
        }
    }

    /// Ends the session: every in-flight call and every pending wait resolves
    /// to "session gone", and the disconnected listeners run once
    pub fn shutdown(&self) {
        if !self.connected.send_replace(false) {
            return;
        }

        let abandoned: Vec<PendingCall> = self
            .pending
            .lock()
            .drain()
            .map(|(_, call)| call)
            .collect();
        info!(
            "Session with the server ended, abandoning {} calls",
            abandoned.len()
        );
        for call in abandoned {
            let _ = call.reply.send(Err(InvocationError::SessionGone));
        }
        for cell in self.properties.values() {
            cell.close();
        }
        self.disconnected.emit(&());
    }
}
