use serde::{Deserialize, Serialize};

mod conditioner;
pub mod error;

pub use conditioner::LinkConditionerConfig;

/// How a packet travels over the substrate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delivery {
    /// Ordered, and guaranteed while the session stays connected
    Reliable,
    /// Best-effort, may be dropped or reordered
    Unreliable,
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::Reliable
    }
}
