use std::sync::Arc;

use log::error;

use super::{Extensions, LookupError, Unit, Units};

/// Handed to [`Unit::init`]. Only units that already finished Init can be
/// looked up; anything else fails immediately with
/// [`LookupError::NotReady`].
pub struct InitContext<'a> {
    unit: &'a str,
    units: &'a Units,
    extensions: &'a Extensions,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(unit: &'a str, units: &'a Units, extensions: &'a Extensions) -> Self {
        Self {
            unit,
            units,
            extensions,
        }
    }

    /// Name of the unit being initialized
    pub fn unit_name(&self) -> &str {
        self.unit
    }

    pub fn get<T: Unit>(&self) -> Result<Arc<T>, LookupError> {
        self.units
            .get_from::<T>(Some(self.unit))
            .inspect_err(|err| error!("{err}"))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Arc<dyn Unit>, LookupError> {
        self.units
            .get_by_name_from(name, Some(self.unit))
            .inspect_err(|err| error!("{err}"))
    }

    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

/// Handed to [`Unit::start`]. Every unit is initialized by then, so every
/// lookup of a registered unit succeeds.
#[derive(Clone)]
pub struct StartContext {
    unit: String,
    units: Arc<Units>,
    extensions: Arc<Extensions>,
}

impl StartContext {
    pub(crate) fn new(unit: String, units: Arc<Units>, extensions: Arc<Extensions>) -> Self {
        Self {
            unit,
            units,
            extensions,
        }
    }

    pub fn unit_name(&self) -> &str {
        &self.unit
    }

    pub fn get<T: Unit>(&self) -> Result<Arc<T>, LookupError> {
        self.units.get::<T>()
    }

    pub fn get_by_name(&self, name: &str) -> Result<Arc<dyn Unit>, LookupError> {
        self.units.get_by_name(name)
    }

    pub fn units(&self) -> &Arc<Units> {
        &self.units
    }

    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}
