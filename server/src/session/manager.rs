use std::{collections::HashMap, sync::Arc};

use log::{debug, error, info};
use parking_lot::Mutex;

use tether_shared::{catch_panic, Listeners, ResourceScope, SessionId, Subscription};

use super::{EntityContext, EntityId, SessionContext};
use crate::SessionError;

struct BoundEntity {
    entity: EntityId,
    scope: ResourceScope,
}

struct SessionRecord {
    scope: ResourceScope,
    entity: Option<BoundEntity>,
    // added callbacks have run for this session
    announced: bool,
    // removing callbacks are running
    closing: bool,
}

#[derive(Default)]
struct SessionTable {
    records: HashMap<SessionId, SessionRecord>,
    order: Vec<SessionId>,
}

#[derive(Default)]
struct ManagerInner {
    table: Mutex<SessionTable>,
    session_added: Listeners<SessionContext>,
    session_removing: Listeners<SessionContext>,
    entity_added: Listeners<EntityContext>,
    entity_removing: Listeners<EntityContext>,
}

/// Tracks connected sessions and the entity each one controls, and runs the
/// registered callbacks as they come and go.
///
/// "Added" callbacks are retroactive: registering one replays it for every
/// session (or bound entity) that already exists, so every callback sees every
/// session exactly once, whenever it was registered. Every session owns a
/// root [`ResourceScope`] released after its removing callbacks have run;
/// a bound entity owns a child of it.
#[derive(Clone, Default)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // Connection

    /// Makes the session visible to [`is_connected`](Self::is_connected) and
    /// [`sessions`](Self::sessions) without running any added callback yet
    pub(crate) fn open(&self, session: SessionId) -> Result<(), SessionError> {
        let mut table = self.inner.table.lock();
        if table.records.contains_key(&session) {
            return Err(SessionError::AlreadyConnected { session });
        }
        table.records.insert(
            session,
            SessionRecord {
                scope: ResourceScope::new(),
                entity: None,
                announced: false,
                closing: false,
            },
        );
        table.order.push(session);
        info!("{session} connected");
        Ok(())
    }

    /// Runs the added callbacks for an opened session, once
    pub(crate) fn announce(&self, session: SessionId) {
        let (context, added) = {
            let mut table = self.inner.table.lock();
            let Some(record) = table.records.get_mut(&session) else {
                return;
            };
            if record.announced {
                return;
            }
            record.announced = true;
            let context = SessionContext {
                session,
                scope: record.scope.clone(),
            };
            (context, self.inner.session_added.snapshot())
        };
        added.emit(&context);
    }

    #[cfg(test)]
    pub(crate) fn connect(&self, session: SessionId) -> Result<(), SessionError> {
        self.open(session)?;
        self.announce(session);
        Ok(())
    }

    /// Runs the session removing callbacks while the session and its entity
    /// are still readable, then the entity removing callbacks, then releases
    /// the session's scope along with the entity scope nested in it
    pub(crate) fn disconnect(&self, session: SessionId) -> Result<(), SessionError> {
        let (context, announced) = {
            let mut table = self.inner.table.lock();
            let record = table
                .records
                .get_mut(&session)
                .filter(|record| !record.closing)
                .ok_or(SessionError::NotConnected { session })?;
            record.closing = true;
            let context = SessionContext {
                session,
                scope: record.scope.clone(),
            };
            (context, record.announced)
        };

        if announced {
            self.inner.session_removing.emit(&context);
        }

        let entity = {
            let mut table = self.inner.table.lock();
            table.order.retain(|open| *open != session);
            table
                .records
                .remove(&session)
                .and_then(|record| record.entity)
        };
        if let Some(bound) = entity {
            debug!("{} unbound from {session}", bound.entity);
            self.inner.entity_removing.emit(&EntityContext {
                session,
                entity: bound.entity,
                scope: bound.scope,
            });
        }
        context.scope.release();
        info!("{session} disconnected");
        Ok(())
    }

    // Entities

    /// Binds `entity` to the session, unbinding the previously bound entity
    /// first. Returns the scope of the new binding.
    pub fn bind_entity(
        &self,
        session: SessionId,
        entity: EntityId,
    ) -> Result<ResourceScope, SessionError> {
        let (previous, context, added) = {
            let mut table = self.inner.table.lock();
            let record = table
                .records
                .get_mut(&session)
                .filter(|record| !record.closing)
                .ok_or(SessionError::NotConnected { session })?;
            let previous = record.entity.take().map(|bound| EntityContext {
                session,
                entity: bound.entity,
                scope: bound.scope,
            });
            let scope = record.scope.create_child();
            record.entity = Some(BoundEntity {
                entity,
                scope: scope.clone(),
            });
            let context = EntityContext {
                session,
                entity,
                scope,
            };
            (previous, context, self.inner.entity_added.snapshot())
        };

        if let Some(previous) = previous {
            self.retire_entity(previous);
        }
        debug!("{} bound to {session}", context.entity);
        added.emit(&context);
        Ok(context.scope)
    }

    /// Unbinds the session's entity, if any, returning it
    pub fn unbind_entity(&self, session: SessionId) -> Result<Option<EntityId>, SessionError> {
        let previous = {
            let mut table = self.inner.table.lock();
            let record = table
                .records
                .get_mut(&session)
                .filter(|record| !record.closing)
                .ok_or(SessionError::NotConnected { session })?;
            record.entity.take()
        };

        Ok(previous.map(|bound| {
            let entity = bound.entity;
            self.retire_entity(EntityContext {
                session,
                entity,
                scope: bound.scope,
            });
            entity
        }))
    }

    fn retire_entity(&self, context: EntityContext) {
        debug!("{} unbound from {}", context.entity, context.session);
        self.inner.entity_removing.emit(&context);
        context.scope.release();
    }

    // Queries

    /// False once the session starts disconnecting
    pub fn is_connected(&self, session: SessionId) -> bool {
        self.inner
            .table
            .lock()
            .records
            .get(&session)
            .is_some_and(|record| !record.closing)
    }

    /// Connected sessions, in connection order
    pub fn sessions(&self) -> Vec<SessionId> {
        self.inner.table.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.table.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scope(&self, session: SessionId) -> Option<ResourceScope> {
        self.inner
            .table
            .lock()
            .records
            .get(&session)
            .map(|record| record.scope.clone())
    }

    pub fn entity(&self, session: SessionId) -> Option<EntityId> {
        self.inner
            .table
            .lock()
            .records
            .get(&session)
            .and_then(|record| record.entity.as_ref())
            .map(|bound| bound.entity)
    }

    pub fn entity_scope(&self, session: SessionId) -> Option<ResourceScope> {
        self.inner
            .table
            .lock()
            .records
            .get(&session)
            .and_then(|record| record.entity.as_ref())
            .map(|bound| bound.scope.clone())
    }

    // Callbacks

    /// Called for every session already connected, then for every session
    /// that connects later
    pub fn on_session_added<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SessionContext) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let (subscription, existing) = {
            let table = self.inner.table.lock();
            let listener = handler.clone();
            let subscription = self
                .inner
                .session_added
                .connect(move |context| listener(context));
            let existing: Vec<SessionContext> = table
                .order
                .iter()
                .filter_map(|session| {
                    let record = table.records.get(session)?;
                    record.announced.then(|| SessionContext {
                        session: *session,
                        scope: record.scope.clone(),
                    })
                })
                .collect();
            (subscription, existing)
        };

        replay(&*handler, &existing);
        subscription
    }

    /// Called when a session disconnects, before its entity is unbound and
    /// before its scope is released
    pub fn on_session_removing<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SessionContext) + Send + Sync + 'static,
    {
        self.inner.session_removing.connect(handler)
    }

    /// Called for every entity already bound, then for every later binding
    pub fn on_entity_added<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&EntityContext) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let (subscription, existing) = {
            let table = self.inner.table.lock();
            let listener = handler.clone();
            let subscription = self
                .inner
                .entity_added
                .connect(move |context| listener(context));
            let existing: Vec<EntityContext> = table
                .order
                .iter()
                .filter_map(|session| {
                    let bound = table.records.get(session)?.entity.as_ref()?;
                    Some(EntityContext {
                        session: *session,
                        entity: bound.entity,
                        scope: bound.scope.clone(),
                    })
                })
                .collect();
            (subscription, existing)
        };

        replay(&*handler, &existing);
        subscription
    }

    /// Called when an entity is unbound, replaced, or its session
    /// disconnects, before the entity scope is released
    pub fn on_entity_removing<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&EntityContext) + Send + Sync + 'static,
    {
        self.inner.entity_removing.connect(handler)
    }
}

fn replay<C>(handler: &(dyn Fn(&C) + Send + Sync), contexts: &[C]) {
    for context in contexts {
        if let Err(message) = catch_panic(|| handler(context)) {
            error!("Session callback panicked while catching up: {message}");
        }
    }
}
