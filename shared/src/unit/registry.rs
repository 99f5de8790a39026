use std::{any::TypeId, collections::HashSet};

use log::debug;

use super::{RegistryError, Unit};

/// Name and dependency list of one unit, the input of [`resolve`](super::resolve)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitDescriptor {
    pub name: String,
    pub dependencies: Vec<String>,
}

impl UnitDescriptor {
    pub fn new(name: impl Into<String>, dependencies: &[&str]) -> Self {
        let mut seen = HashSet::new();
        let dependencies = dependencies
            .iter()
            .filter(|dependency| seen.insert(**dependency))
            .map(|dependency| dependency.to_string())
            .collect();
        Self {
            name: name.into(),
            dependencies,
        }
    }
}

pub(crate) struct RegisteredUnit {
    pub(crate) descriptor: UnitDescriptor,
    pub(crate) type_id: TypeId,
    pub(crate) unit: Box<dyn Unit>,
}

/// Units in declaration order. Name and dependencies are captured at
/// registration and never change afterwards.
#[derive(Default)]
pub struct UnitRegistry {
    entries: Vec<RegisteredUnit>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<U: Unit>(&mut self, unit: U) -> Result<(), RegistryError> {
        let descriptor = UnitDescriptor::new(unit.name(), unit.dependencies());
        if self.contains(&descriptor.name) {
            return Err(RegistryError::DuplicateUnit {
                name: descriptor.name,
            });
        }

        debug!(
            "Registered unit {} (dependencies: {:?})",
            descriptor.name, descriptor.dependencies
        );
        self.entries.push(RegisteredUnit {
            descriptor,
            type_id: TypeId::of::<U>(),
            unit: Box::new(unit),
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.descriptor.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|entry| entry.descriptor.name.as_str())
    }

    pub fn descriptors(&self) -> Vec<UnitDescriptor> {
        self.entries
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<RegisteredUnit> {
        self.entries
    }
}
