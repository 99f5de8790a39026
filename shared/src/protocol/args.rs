use std::any::type_name;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::PayloadError;

/// Marker for types that can travel through a remote channel
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static> Payload for T {}

/// The dynamic argument list seen by middleware.
///
/// Typed channels encode their payload as a single argument; interceptors may
/// inspect, rewrite, append or drop arguments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn encode<T: Serialize>(payload: &T) -> Result<Self, PayloadError> {
        let value = serde_json::to_value(payload).map_err(|err| PayloadError::Encode {
            reason: err.to_string(),
        })?;
        Ok(Self(vec![value]))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        if self.0.len() != 1 {
            return Err(PayloadError::ArgumentCount {
                expected: 1,
                found: self.0.len(),
            });
        }
        T::deserialize(&self.0[0]).map_err(|err| PayloadError::Decode {
            type_name: type_name::<T>(),
            reason: err.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn values_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}
