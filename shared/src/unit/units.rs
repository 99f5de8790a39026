use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use super::{LookupError, Unit};

/// The set of units that finished Init, plus an index of everything that was
/// registered so lookups can tell "unknown" from "not ready yet".
pub struct Units {
    ready: HashMap<String, Arc<dyn Unit>>,
    order: Vec<String>,
    declared: HashMap<String, TypeId>,
    // names per type, in declaration order
    by_type: HashMap<TypeId, Vec<String>>,
}

impl Units {
    pub(crate) fn new(declared: impl IntoIterator<Item = (String, TypeId)>) -> Self {
        let mut by_type: HashMap<TypeId, Vec<String>> = HashMap::new();
        let declared: HashMap<String, TypeId> = declared
            .into_iter()
            .inspect(|(name, type_id)| by_type.entry(*type_id).or_default().push(name.clone()))
            .collect();
        Self {
            ready: HashMap::new(),
            order: Vec::new(),
            declared,
            by_type,
        }
    }

    pub(crate) fn insert(&mut self, name: String, unit: Arc<dyn Unit>) {
        self.order.push(name.clone());
        self.ready.insert(name, unit);
    }

    /// Looks a unit up by its concrete type. Fails with
    /// [`LookupError::Ambiguous`] when several units of that type are
    /// registered; use [`get_named`](Self::get_named) for those.
    pub fn get<T: Unit>(&self) -> Result<Arc<T>, LookupError> {
        self.get_from::<T>(None)
    }

    /// Looks a unit up by name and downcasts it
    pub fn get_named<T: Unit>(&self, name: &str) -> Result<Arc<T>, LookupError> {
        let unit = self.get_by_name_from(name, None)?;
        downcast::<T>(name, unit)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Arc<dyn Unit>, LookupError> {
        self.get_by_name_from(name, None)
    }

    /// The unit as `Any`, for callers that downcast on their own
    pub fn get_any(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.ready.get(name).cloned().map(|unit| unit.into_any_arc())
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.ready.contains_key(name)
    }

    /// Names of initialized units, in the order they finished Init
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub(crate) fn get_from<T: Unit>(&self, requester: Option<&str>) -> Result<Arc<T>, LookupError> {
        let name = match self.by_type.get(&TypeId::of::<T>()).map(Vec::as_slice) {
            Some([name]) => name,
            Some(names) if !names.is_empty() => {
                return Err(LookupError::Ambiguous {
                    type_name: type_name::<T>(),
                    units: names.to_vec(),
                })
            }
            _ => {
                return Err(LookupError::Unknown {
                    requested: type_name::<T>().to_string(),
                })
            }
        };
        let unit = self.get_by_name_from(name, requester)?;
        downcast::<T>(name, unit)
    }

    pub(crate) fn get_by_name_from(
        &self,
        name: &str,
        requester: Option<&str>,
    ) -> Result<Arc<dyn Unit>, LookupError> {
        if let Some(unit) = self.ready.get(name) {
            return Ok(unit.clone());
        }
        if self.declared.contains_key(name) {
            Err(LookupError::NotReady {
                requested: name.to_string(),
                requester: requester.map(str::to_string),
            })
        } else {
            Err(LookupError::Unknown {
                requested: name.to_string(),
            })
        }
    }
}

fn downcast<T: Unit>(name: &str, unit: Arc<dyn Unit>) -> Result<Arc<T>, LookupError> {
    unit.into_any_arc()
        .downcast::<T>()
        .map_err(|_| LookupError::WrongType {
            requested: name.to_string(),
            type_name: type_name::<T>(),
        })
}
