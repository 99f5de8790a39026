use thiserror::Error;

use crate::BoxError;

/// Errors raised while registering units
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two units share a name
    #[error("A unit named {name:?} is already registered. Unit names must be unique")]
    DuplicateUnit { name: String },

    /// One unit exposes two channels under the same name
    #[error("Unit {unit:?} exposes more than one channel named {channel:?}")]
    DuplicateChannel { unit: String, channel: String },

    /// A channel handle was exposed twice, by one unit or by two
    #[error("Channel {unit}.{channel} is already exposed elsewhere. A handle can only be exposed once")]
    AlreadyBound { unit: String, channel: String },
}

/// Errors raised while ordering units
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A unit depends on a name nobody registered
    #[error("Unit {unit:?} depends on {dependency:?}, which is not registered")]
    UnknownDependency { unit: String, dependency: String },

    /// The dependency graph is not a DAG
    #[error("Dependency cycle between units {units:?}")]
    Cycle { units: Vec<String> },
}

/// Errors raised when one unit looks up another
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Nothing registered under that name or type
    #[error("No unit {requested} is registered")]
    Unknown { requested: String },

    /// The unit exists but has not finished Init yet
    #[error("Unit {requested} was looked up by {requester:?} before it finished initializing. Declare it as a dependency")]
    NotReady {
        requested: String,
        requester: Option<String>,
    },

    /// The unit exists but is not of the requested type
    #[error("Unit {requested} is not of type {type_name}")]
    WrongType {
        requested: String,
        type_name: &'static str,
    },

    /// Several units share the requested type
    #[error("Units {units:?} are all of type {type_name}. Look them up by name")]
    Ambiguous {
        type_name: &'static str,
        units: Vec<String>,
    },
}

/// Fatal startup errors. Nothing after the failing step runs.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("Scheduling failed: {0}")]
    Schedule(#[from] ScheduleError),

    /// A unit's Init returned an error or panicked
    #[error("Unit {unit:?} failed to initialize: {source}")]
    InitFailure {
        unit: String,
        #[source]
        source: BoxError,
    },

    /// Start tasks need a tokio runtime to be spawned on
    #[error("Startup must run inside a tokio runtime")]
    NoRuntime,
}

impl StartupError {
    /// Name of the unit whose Init failed, if that is what happened
    pub fn failed_unit(&self) -> Option<&str> {
        match self {
            StartupError::InitFailure { unit, .. } => Some(unit),
            _ => None,
        }
    }
}
