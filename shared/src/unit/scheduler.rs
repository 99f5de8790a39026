//! Dependency ordering and the two phase startup protocol.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    sync::Arc,
};

use log::{debug, error, info};
use tokio::{runtime::Handle, task::JoinHandle};

use super::{
    context::{InitContext, StartContext},
    registry::RegisteredUnit,
    Extensions, ScheduleError, StartupError, Unit, UnitDescriptor, UnitRegistry, UnitState,
    UnitStates, Units,
};
use crate::unwind::catch_panic;

/// Orders units so every unit comes after all of its dependencies, using
/// Kahn's algorithm. Among units that are eligible at the same time the one
/// declared first goes first, so identical registration order always yields
/// the identical startup order.
///
/// Returns indices into `units`.
pub fn resolve(units: &[UnitDescriptor]) -> Result<Vec<usize>, ScheduleError> {
    let index_of: HashMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(index, unit)| (unit.name.as_str(), index))
        .collect();

    // 1. Build dependents lists and in-degree counts, failing fast on unknown names.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
    let mut in_degree: Vec<usize> = vec![0; units.len()];
    for (index, unit) in units.iter().enumerate() {
        for dependency in &unit.dependencies {
            let Some(&dependency_index) = index_of.get(dependency.as_str()) else {
                return Err(ScheduleError::UnknownDependency {
                    unit: unit.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            dependents[dependency_index].push(index);
            in_degree[index] += 1;
        }
    }

    // 2. Seed with every unit that has no dependencies.
    let mut eligible: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    // 3. Always take the earliest declared eligible unit.
    let mut order = Vec::with_capacity(units.len());
    while let Some(Reverse(index)) = eligible.pop() {
        order.push(index);
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                eligible.push(Reverse(dependent));
            }
        }
    }

    // 4. Anything left over sits on or behind a cycle.
    if order.len() != units.len() {
        let units = cycle_members(units, &in_degree, &dependents);
        return Err(ScheduleError::Cycle { units });
    }

    Ok(order)
}

/// Trims units that only wait on a cycle without being part of one, leaving
/// the units that actually participate.
fn cycle_members(
    units: &[UnitDescriptor],
    in_degree: &[usize],
    dependents: &[Vec<usize>],
) -> Vec<String> {
    let mut remaining: Vec<bool> = in_degree.iter().map(|degree| *degree > 0).collect();

    loop {
        let mut trimmed = false;
        for index in 0..units.len() {
            if !remaining[index] {
                continue;
            }
            let feeds_remaining = dependents[index]
                .iter()
                .any(|dependent| remaining[*dependent]);
            if !feeds_remaining {
                remaining[index] = false;
                trimmed = true;
            }
        }
        if !trimmed {
            break;
        }
    }

    units
        .iter()
        .zip(remaining)
        .filter(|(_, remaining)| *remaining)
        .map(|(unit, _)| unit.name.clone())
        .collect()
}

/// Outcome of a successful startup: every unit is initialized and every
/// Start task has been launched.
pub struct Startup {
    units: Arc<Units>,
    states: UnitStates,
    tasks: Vec<JoinHandle<()>>,
}

impl Startup {
    pub fn units(&self) -> &Arc<Units> {
        &self.units
    }

    pub fn states(&self) -> &UnitStates {
        &self.states
    }

    /// Waits until every Start task has finished, successfully or not
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }

    pub fn into_parts(self) -> (Arc<Units>, UnitStates, Vec<JoinHandle<()>>) {
        (self.units, self.states, self.tasks)
    }
}

pub struct DependencyScheduler;

impl DependencyScheduler {
    /// Resolves the registry, runs every Init in order, then launches every
    /// Start as its own task.
    ///
    /// Fails without calling any Init if the graph cannot be resolved, and
    /// stops at the first failing Init without calling any later one.
    pub fn run(
        registry: UnitRegistry,
        extensions: Arc<Extensions>,
    ) -> Result<Startup, StartupError> {
        let runtime = Handle::try_current().map_err(|_| StartupError::NoRuntime)?;

        let order = resolve(&registry.descriptors())?;
        let states = UnitStates::new(registry.names());

        let entries = registry.into_entries();
        let mut units = Units::new(
            entries
                .iter()
                .map(|entry| (entry.descriptor.name.clone(), entry.type_id)),
        );
        let mut slots: Vec<Option<RegisteredUnit>> = entries.into_iter().map(Some).collect();

        // Init phase
        let mut started_order = Vec::with_capacity(order.len());
        for index in order {
            let Some(RegisteredUnit {
                descriptor,
                mut unit,
                ..
            }) = slots[index].take()
            else {
                continue;
            };
            let name = descriptor.name;

            states.set(&name, UnitState::Initializing);
            debug!("Initializing unit {name}");

            let outcome = {
                let mut ctx = InitContext::new(&name, &units, &extensions);
                catch_panic(|| unit.init(&mut ctx))
            };
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(source)) => Some(source),
                Err(message) => Some(format!("panicked: {message}").into()),
            };
            if let Some(source) = failure {
                states.set(&name, UnitState::Failed);
                error!("Unit {name} failed to initialize: {source}. Aborting startup");
                return Err(StartupError::InitFailure { unit: name, source });
            }

            states.set(&name, UnitState::Initialized);
            let unit: Arc<dyn Unit> = Arc::from(unit);
            units.insert(name.clone(), unit);
            started_order.push(name);
        }
        info!("Initialized {} units", started_order.len());

        // Start phase
        let units = Arc::new(units);
        let mut tasks = Vec::with_capacity(started_order.len());
        for name in started_order {
            let Ok(unit) = units.get_by_name(&name) else {
                continue;
            };
            states.set(&name, UnitState::Starting);

            let ctx = StartContext::new(name.clone(), units.clone(), extensions.clone());
            let start = runtime.spawn(async move { unit.start(ctx).await });

            let task_states = states.clone();
            tasks.push(runtime.spawn(async move {
                match start.await {
                    Ok(Ok(())) => {
                        debug!("Unit {name} started");
                        task_states.set(&name, UnitState::Running);
                    }
                    Ok(Err(err)) => {
                        error!("Unit {name} failed to start: {err}");
                        task_states.set(&name, UnitState::Failed);
                    }
                    Err(err) => {
                        error!("Unit {name} panicked while starting: {err}");
                        task_states.set(&name, UnitState::Failed);
                    }
                }
            }));
        }

        Ok(Startup {
            units,
            states,
            tasks,
        })
    }
}
