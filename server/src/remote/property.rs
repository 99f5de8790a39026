use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock},
};

use log::{debug, error, warn};
use parking_lot::{Mutex, ReentrantMutex};

use tether_shared::{
    catch_panic, Args, ChannelId, Delivery, Listeners, Packet, Payload, SessionId, Subscription,
};

use super::{Binding, Endpoint, PropertyEndpoint};
use crate::ChannelError;

struct PropertyState<T> {
    top: T,
    overrides: HashMap<SessionId, T>,
}

impl<T: Clone> PropertyState<T> {
    fn effective(&self, session: SessionId) -> T {
        self.overrides
            .get(&session)
            .unwrap_or(&self.top)
            .clone()
    }
}

struct PropertyShared<T> {
    binding: OnceLock<Arc<Binding>>,
    state: Mutex<PropertyState<T>>,
    // held across a whole change: state update, observer calls and pushes
    notify: ReentrantMutex<()>,
    top_observers: Listeners<T>,
    session_observers: Mutex<HashMap<SessionId, Listeners<T>>>,
}

/// A replicated value with a server-wide top value and optional per-session
/// overrides.
///
/// Each session sees its override if it has one, the top value otherwise.
/// Every change is pushed to the sessions it affects, in the order the
/// changes were made.
pub struct RemoteProperty<T: Payload> {
    shared: Arc<PropertyShared<T>>,
}

impl<T: Payload> Clone for RemoteProperty<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Payload + Default> Default for RemoteProperty<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Payload> RemoteProperty<T> {
    pub fn new(initial: T) -> Self {
        Self {
            shared: Arc::new(PropertyShared {
                binding: OnceLock::new(),
                state: Mutex::new(PropertyState {
                    top: initial,
                    overrides: HashMap::new(),
                }),
                notify: ReentrantMutex::new(()),
                top_observers: Listeners::new(),
                session_observers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn channel(&self) -> Option<&ChannelId> {
        self.shared.binding.get().map(|binding| &binding.channel)
    }

    // Reads

    /// The top value
    pub fn get(&self) -> T {
        self.shared.state.lock().top.clone()
    }

    /// The value `session` sees
    pub fn get_for(&self, session: SessionId) -> T {
        self.shared.state.lock().effective(session)
    }

    pub fn has_override(&self, session: SessionId) -> bool {
        self.shared.state.lock().overrides.contains_key(&session)
    }

    // Writes

    /// Replaces the top value and clears every override, so every session
    /// sees `value`
    pub fn set(&self, value: T) -> Result<(), ChannelError> {
        let args = Args::encode(&value)?;
        let _guard = self.shared.notify.lock();
        {
            let mut state = self.shared.state.lock();
            state.top = value.clone();
            state.overrides.clear();
        }

        self.shared.top_observers.emit(&value);
        for (_, observers) in self.shared.observed_sessions() {
            observers.emit(&value);
        }
        if let Some(binding) = self.shared.binding.get() {
            let targets = binding.sessions().sessions();
            self.shared.push_broadcast(binding, targets, args);
        }
        Ok(())
    }

    /// Replaces the top value only. Sessions with an override keep it and
    /// are not notified.
    pub fn set_top(&self, value: T) -> Result<(), ChannelError> {
        let args = Args::encode(&value)?;
        let _guard = self.shared.notify.lock();
        let overridden: HashSet<SessionId> = {
            let mut state = self.shared.state.lock();
            state.top = value.clone();
            state.overrides.keys().copied().collect()
        };

        self.shared.top_observers.emit(&value);
        for (session, observers) in self.shared.observed_sessions() {
            if !overridden.contains(&session) {
                observers.emit(&value);
            }
        }
        if let Some(binding) = self.shared.binding.get() {
            let targets: Vec<SessionId> = binding
                .sessions()
                .sessions()
                .into_iter()
                .filter(|session| !overridden.contains(session))
                .collect();
            self.shared.push_broadcast(binding, targets, args);
        }
        Ok(())
    }

    /// Overrides the value `session` sees
    pub fn set_for(&self, session: SessionId, value: T) -> Result<(), ChannelError> {
        let binding = self.binding()?;
        let args = Args::encode(&value)?;
        // forget runs under the same guard
        let _guard = self.shared.notify.lock();
        if !binding.sessions().is_connected(session) {
            return Err(ChannelError::SessionNotConnected { session });
        }
        self.shared.apply_override(binding, session, value, args);
        Ok(())
    }

    /// Overrides the value for each listed session that is connected
    pub fn set_for_each<I: IntoIterator<Item = SessionId>>(
        &self,
        sessions: I,
        value: T,
    ) -> Result<(), ChannelError> {
        let binding = self.binding()?;
        let args = Args::encode(&value)?;
        let _guard = self.shared.notify.lock();
        for session in sessions {
            if binding.sessions().is_connected(session) {
                self.shared
                    .apply_override(binding, session, value.clone(), args.clone());
            }
        }
        Ok(())
    }

    /// Overrides the value for every connected session matching `predicate`
    pub fn set_filter<F: Fn(SessionId) -> bool>(
        &self,
        predicate: F,
        value: T,
    ) -> Result<(), ChannelError> {
        let binding = self.binding()?;
        let targets: Vec<SessionId> = binding
            .sessions()
            .sessions()
            .into_iter()
            .filter(|session| predicate(*session))
            .collect();
        self.set_for_each(targets, value)
    }

    /// Drops the override of `session`, which sees the top value again
    pub fn clear_for(&self, session: SessionId) -> Result<(), ChannelError> {
        let _guard = self.shared.notify.lock();
        let top = {
            let mut state = self.shared.state.lock();
            if state.overrides.remove(&session).is_none() {
                return Ok(());
            }
            state.top.clone()
        };

        if let Some(observers) = self.shared.observers_of(session) {
            observers.emit(&top);
        }
        if let Some(binding) = self.shared.binding.get() {
            let args = Args::encode(&top)?;
            self.shared.push_to(binding, session, args);
        }
        Ok(())
    }

    // Observation

    /// Calls `handler` right away with the current value, then on every
    /// change. With a session, follows the value that session sees; without,
    /// follows the top value.
    ///
    /// A session observer needs the property to be exposed and the session
    /// to be connected. Otherwise `handler` is never called and the returned
    /// subscription is detached.
    pub fn observe<F: Fn(&T) + Send + Sync + 'static>(
        &self,
        session: Option<SessionId>,
        handler: F,
    ) -> Subscription {
        let handler = Arc::new(handler);
        let _guard = self.shared.notify.lock();
        if let Some(session) = session {
            let connected = self
                .shared
                .binding
                .get()
                .is_some_and(|binding| binding.sessions().is_connected(session));
            if !connected {
                debug!("Not observing a property for {session}, which is not connected");
                return Subscription::detached();
            }
        }
        let current = {
            let state = self.shared.state.lock();
            match session {
                Some(session) => state.effective(session),
                None => state.top.clone(),
            }
        };

        let listener = handler.clone();
        let subscription = match session {
            Some(session) => self
                .shared
                .session_observers
                .lock()
                .entry(session)
                .or_default()
                .connect(move |value| listener(value)),
            None => self.shared.top_observers.connect(move |value| listener(value)),
        };

        if let Err(message) = catch_panic(|| handler(&current)) {
            error!("Property observer panicked on its first call: {message}");
        }
        subscription
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::Property(self.shared.clone())
    }

    fn binding(&self) -> Result<&Arc<Binding>, ChannelError> {
        self.shared.binding.get().ok_or(ChannelError::Unbound)
    }
}

impl<T: Payload> PropertyShared<T> {
    fn observed_sessions(&self) -> Vec<(SessionId, Listeners<T>)> {
        self.session_observers
            .lock()
            .iter()
            .map(|(session, observers)| (*session, observers.clone()))
            .collect()
    }

    fn observers_of(&self, session: SessionId) -> Option<Listeners<T>> {
        self.session_observers.lock().get(&session).cloned()
    }

    // caller holds the notify guard
    fn apply_override(&self, binding: &Binding, session: SessionId, value: T, args: Args) {
        self.state.lock().overrides.insert(session, value.clone());
        if let Some(observers) = self.observers_of(session) {
            observers.emit(&value);
        }
        self.push_to(binding, session, args);
    }

    /// One outbound middleware pass keyed by no session, then the same
    /// packet to every target
    fn push_broadcast(&self, binding: &Binding, targets: Vec<SessionId>, args: Args) {
        if targets.is_empty() {
            return;
        }
        let Some(args) = binding.outbound(None, args) else {
            return;
        };
        let packet = Packet::Property {
            channel: binding.channel.clone(),
            args,
        };
        for session in targets {
            if let Err(err) = binding.send(session, Delivery::Reliable, &packet) {
                warn!("Failed to push {} to {session}: {err}", binding.channel);
            }
        }
    }

    fn push_to(&self, binding: &Binding, session: SessionId, args: Args) {
        let Some(args) = binding.outbound(Some(session), args) else {
            return;
        };
        let packet = Packet::Property {
            channel: binding.channel.clone(),
            args,
        };
        if let Err(err) = binding.send(session, Delivery::Reliable, &packet) {
            warn!("Failed to push {} to {session}: {err}", binding.channel);
        }
    }
}

impl<T: Payload> PropertyEndpoint for PropertyShared<T> {
    fn bind(&self, binding: Arc<Binding>) -> bool {
        self.binding.set(binding).is_ok()
    }

    fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    fn greet(&self, session: SessionId) {
        let Some(binding) = self.binding.get() else {
            return;
        };
        let _guard = self.notify.lock();
        let value = self.state.lock().effective(session);
        match Args::encode(&value) {
            Ok(args) => self.push_to(binding, session, args),
            Err(err) => error!("Cannot encode {} for {session}: {err}", binding.channel),
        }
    }

    fn forget(&self, session: SessionId) {
        let _guard = self.notify.lock();
        self.state.lock().overrides.remove(&session);
        let observers = self.session_observers.lock().remove(&session);
        if let Some(observers) = observers {
            observers.clear();
        }
    }
}
