//! Dissemination parameters.

use crate::error::GossipError;
use crate::predicate::ExpiryPredicate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the dissemination loop.
///
/// `retention_window` and `margin` are in ticks of the logical clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Interval between ticks.
    pub tick_period: Duration,
    /// Number of peers targeted per tick.
    pub fanout: usize,
    /// Maximum number of sends per rumor on this node.
    pub max_sends: u32,
    /// Nominal number of ticks a record is retained.
    pub retention_window: u64,
    /// Early-eviction buffer subtracted from the retention window.
    pub margin: u64,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(200),
            fanout: 3,
            max_sends: 3,
            retention_window: 100,
            margin: 10,
        }
    }
}

impl GossipConfig {
    /// Creates a config tuned for small test clusters: fast ticks, short retention.
    #[must_use]
    pub fn small_cluster() -> Self {
        Self {
            tick_period: Duration::from_millis(20),
            fanout: 2,
            retention_window: 30,
            margin: 5,
            ..Self::default()
        }
    }

    /// Sets the tick period.
    #[must_use]
    pub const fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Sets the fanout.
    #[must_use]
    pub const fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    /// Sets the maximum sends per rumor.
    #[must_use]
    pub const fn with_max_sends(mut self, max_sends: u32) -> Self {
        self.max_sends = max_sends;
        self
    }

    /// Sets the retention window and margin.
    #[must_use]
    pub const fn with_retention(mut self, retention_window: u64, margin: u64) -> Self {
        self.retention_window = retention_window;
        self.margin = margin;
        self
    }

    /// Returns the expiry predicate described by this config.
    #[must_use]
    pub const fn expiry(&self) -> ExpiryPredicate {
        ExpiryPredicate::new(self.retention_window, self.margin)
    }

    /// Checks the config for values the loop cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::Config`] describing the first bad field.
    pub fn validate(&self) -> Result<(), GossipError> {
        if self.tick_period.is_zero() {
            return Err(GossipError::Config("tick_period must be non-zero".to_string()));
        }
        if self.fanout == 0 {
            return Err(GossipError::Config("fanout must be at least 1".to_string()));
        }
        if self.max_sends == 0 {
            return Err(GossipError::Config("max_sends must be at least 1".to_string()));
        }
        if self.retention_window <= self.margin {
            return Err(GossipError::Config(format!(
                "retention_window ({}) must exceed margin ({})",
                self.retention_window, self.margin
            )));
        }
        Ok(())
    }
}
