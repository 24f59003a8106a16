//! Scheduler configuration, fixed at construction time.

use crate::error::ConfigError;
use crate::priority::{Priority, MAX_PRIORITY_LIMIT, PRIORITIES_PER_GROUP};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub name: &'static str,
    /// Number of priority levels; a multiple of 32 up to 1024.
    pub max_priorities: u16,
    /// Graded preemption thresholds. When off, a threshold is either the
    /// thread's own priority or 0 (no preemption at all).
    pub preemption_threshold: bool,
    /// Feed threshold preemptions to the performance observer.
    pub performance_info: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "ptk",
            max_priorities: PRIORITIES_PER_GROUP,
            preemption_threshold: true,
            performance_info: false,
        }
    }
}

impl SchedulerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = self.max_priorities;
        if max < PRIORITIES_PER_GROUP || max > MAX_PRIORITY_LIMIT || max % PRIORITIES_PER_GROUP != 0 {
            return Err(ConfigError::InvalidMaxPriorities(max));
        }
        Ok(())
    }

    pub fn contains(&self, prio: Priority) -> bool {
        prio.raw() < self.max_priorities
    }

    /// Applies the disabled-threshold rule: anything other than the thread's
    /// own priority collapses to 0.
    pub fn coerce_threshold(&self, priority: Priority, requested: Priority) -> Priority {
        if self.preemption_threshold || requested == priority {
            requested
        } else {
            Priority::HIGHEST
        }
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    pub fn max_priorities(mut self, max: u16) -> Self {
        self.config.max_priorities = max;
        self
    }

    pub fn preemption_threshold(mut self, enabled: bool) -> Self {
        self.config.preemption_threshold = enabled;
        self
    }

    pub fn performance_info(mut self, enabled: bool) -> Self {
        self.config.performance_info = enabled;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<SchedulerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
