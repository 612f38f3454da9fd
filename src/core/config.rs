/// Configuration for production line simulation
///
/// This module provides the knobs that control task cadence, defaults for newly created
/// nodes and the bounds used to validate user supplied parameters.
use crate::core::errors::SimulationError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Upper bound accepted for the Start node's production target
pub const MAX_TOTAL_TO_GENERATE: u64 = 10_000;

/// What a machine does with a finished product when its output queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackpressurePolicy {
    /// Put the product back into the input queue it came from and poll again
    RequeueToInput,
    /// Keep the product on the machine and retry the hand-off after a poll delay
    HoldAndRetry,
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        BackpressurePolicy::RequeueToInput
    }
}

/// Configuration for simulation execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Period of the product generator
    pub generation_interval: Duration,
    /// Period of the automatic snapshot task
    pub snapshot_interval: Duration,
    /// Delay between polls of an empty input queue
    pub idle_poll_interval: Duration,
    /// How long a machine flashes after finishing a product
    pub flash_duration: Duration,
    /// Upper bound on each task's shutdown before it is aborted
    pub shutdown_timeout: Duration,
    /// Size of the snapshot history
    pub max_snapshots: usize,
    /// Initial production target of the Start node
    pub total_to_generate: u64,
    /// Capacity used by `add_queue` callers that do not care
    pub default_queue_capacity: usize,
    /// Service time bounds (ms) used by callers that do not care
    pub default_service_time: (u64, u64),
    /// Reliability given to machines created through `add_machine`
    pub default_reliability: f64,
    /// Priorities assigned to generated products
    pub priority_range: RangeInclusive<i32>,
    /// Colours assigned to generated products
    pub palette: Vec<String>,
    /// Seed for the generator and worker RNGs; entropy when `None`
    pub random_seed: Option<u64>,
    /// Output-full handling for machines
    pub backpressure: BackpressurePolicy,
}

impl SimulationConfig {
    /// Create a new simulation configuration with default values
    pub fn new() -> Self {
        Self {
            generation_interval: Duration::from_millis(2000),
            snapshot_interval: Duration::from_millis(500),
            idle_poll_interval: Duration::from_millis(100),
            flash_duration: Duration::from_millis(300),
            shutdown_timeout: Duration::from_secs(2),
            max_snapshots: 50,
            total_to_generate: 10,
            default_queue_capacity: 100,
            default_service_time: (2000, 4000),
            default_reliability: 0.95,
            priority_range: 1..=5,
            palette: [
                "#ef4444", "#f97316", "#eab308", "#22c55e", "#3b82f6", "#8b5cf6", "#ec4899",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            random_seed: None,
            backpressure: BackpressurePolicy::default(),
        }
    }

    pub fn with_generation_interval(mut self, interval: Duration) -> Self {
        self.generation_interval = interval;
        self
    }

    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn with_idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = interval;
        self
    }

    pub fn with_flash_duration(mut self, duration: Duration) -> Self {
        self.flash_duration = duration;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }

    pub fn with_total_to_generate(mut self, total: u64) -> Self {
        self.total_to_generate = total;
        self
    }

    pub fn with_default_reliability(mut self, reliability: f64) -> Self {
        self.default_reliability = reliability;
        self
    }

    pub fn with_priority_range(mut self, range: RangeInclusive<i32>) -> Self {
        self.priority_range = range;
        self
    }

    pub fn with_random_seed(mut self, seed: Option<u64>) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    /// Check that every interval is non-zero and every range is well formed
    pub fn validate(&self) -> Result<(), SimulationError> {
        let intervals = [
            ("generation_interval", self.generation_interval),
            ("snapshot_interval", self.snapshot_interval),
            ("idle_poll_interval", self.idle_poll_interval),
        ];
        for (name, interval) in intervals {
            if interval.is_zero() {
                return Err(SimulationError::invalid(name, "must be greater than zero"));
            }
        }
        if self.max_snapshots == 0 {
            return Err(SimulationError::invalid("max_snapshots", "must be greater than zero"));
        }
        if self.total_to_generate > MAX_TOTAL_TO_GENERATE {
            return Err(SimulationError::invalid(
                "total_to_generate",
                format!("must be at most {}", MAX_TOTAL_TO_GENERATE),
            ));
        }
        if self.default_queue_capacity == 0 {
            return Err(SimulationError::invalid("default_queue_capacity", "must be greater than zero"));
        }
        let (min, max) = self.default_service_time;
        if min > max {
            return Err(SimulationError::invalid("default_service_time", "min exceeds max"));
        }
        if !(0.0..=1.0).contains(&self.default_reliability) {
            return Err(SimulationError::invalid("default_reliability", "must lie in [0, 1]"));
        }
        if self.priority_range.is_empty() {
            return Err(SimulationError::invalid("priority_range", "range is empty"));
        }
        if self.palette.is_empty() {
            return Err(SimulationError::invalid("palette", "at least one colour is required"));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_eq!(config.generation_interval, Duration::from_millis(2000));
        assert_eq!(config.snapshot_interval, Duration::from_millis(500));
        assert_eq!(config.max_snapshots, 50);
        assert_eq!(config.backpressure, BackpressurePolicy::RequeueToInput);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SimulationConfig::new()
            .with_generation_interval(Duration::from_millis(10))
            .with_total_to_generate(3)
            .with_random_seed(Some(7))
            .with_backpressure(BackpressurePolicy::HoldAndRetry);

        assert_eq!(config.generation_interval, Duration::from_millis(10));
        assert_eq!(config.total_to_generate, 3);
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.backpressure, BackpressurePolicy::HoldAndRetry);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_interval = SimulationConfig::new().with_generation_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());

        let too_many = SimulationConfig::new().with_total_to_generate(MAX_TOTAL_TO_GENERATE + 1);
        assert!(too_many.validate().is_err());

        let bad_reliability = SimulationConfig::new().with_default_reliability(1.5);
        assert!(bad_reliability.validate().is_err());

        #[allow(clippy::reversed_empty_ranges)]
        let empty_priorities = SimulationConfig::new().with_priority_range(5..=1);
        assert!(empty_priorities.validate().is_err());
    }
}
