use std::{any::Any, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;

pub mod context;
pub mod error;
pub mod extensions;
pub mod registry;
pub mod scheduler;
pub mod units;

pub use context::{InitContext, StartContext};
pub use error::{LookupError, RegistryError, ScheduleError, StartupError};
pub use extensions::Extensions;
pub use registry::{UnitDescriptor, UnitRegistry};
pub use scheduler::{resolve, DependencyScheduler, Startup};
pub use units::Units;

/// Boxed error returned by user lifecycle callbacks and handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Lets `Arc<dyn Unit>` be downcast back to its concrete type
pub trait AsAnyArc: Any + Send + Sync {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// Unit Trait
/// A named piece of application logic with declared dependencies and a two
/// phase lifecycle.
///
/// `init` runs synchronously, in dependency order, one unit at a time, and may
/// look up any unit that already finished its own `init`. `start` runs as an
/// independent task once every unit is initialized.
#[async_trait]
pub trait Unit: AsAnyArc {
    /// Unique name of this unit
    fn name(&self) -> &str;

    /// Names of units that must finish `init` before this one
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    fn init(&mut self, _ctx: &mut InitContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    async fn start(&self, _ctx: StartContext) -> Result<(), BoxError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitState {
    Registered,
    Initializing,
    Initialized,
    Starting,
    Running,
    Failed,
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Running | UnitState::Failed)
    }
}

/// Lifecycle state of every registered unit, shared with the Start tasks
#[derive(Clone, Default)]
pub struct UnitStates {
    states: Arc<Mutex<HashMap<String, UnitState>>>,
}

impl UnitStates {
    pub(crate) fn new<'a>(names: impl Iterator<Item = &'a str>) -> Self {
        let states = names
            .map(|name| (name.to_string(), UnitState::Registered))
            .collect();
        Self {
            states: Arc::new(Mutex::new(states)),
        }
    }

    pub(crate) fn set(&self, name: &str, state: UnitState) {
        self.states.lock().insert(name.to_string(), state);
    }

    pub fn get(&self, name: &str) -> Option<UnitState> {
        self.states.lock().get(name).copied()
    }

    pub fn snapshot(&self) -> HashMap<String, UnitState> {
        self.states.lock().clone()
    }
}
