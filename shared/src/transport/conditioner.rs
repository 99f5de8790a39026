use std::time::Duration;

/// Simulated network conditions for in-memory transports
#[derive(Clone, Debug, PartialEq)]
pub struct LinkConditionerConfig {
    /// Added to every packet, in both directions. Reliable packets keep their
    /// order.
    pub latency: Duration,
    /// Share of unreliable packets dropped, between 0.0 and 1.0. Reliable
    /// packets are never dropped.
    pub unreliable_loss: f32,
}

impl LinkConditionerConfig {
    pub fn new(latency: Duration, unreliable_loss: f32) -> Self {
        Self {
            latency,
            unreliable_loss: unreliable_loss.clamp(0.0, 1.0),
        }
    }

    /// No latency, no loss
    pub fn perfect_condition() -> Self {
        Self::new(Duration::ZERO, 0.0)
    }

    pub fn average_condition() -> Self {
        Self::new(Duration::from_millis(40), 0.02)
    }

    pub fn poor_condition() -> Self {
        Self::new(Duration::from_millis(120), 0.1)
    }
}

impl Default for LinkConditionerConfig {
    fn default() -> Self {
        Self::perfect_condition()
    }
}
