//! Timing configuration for the execution state machine.

use std::time::Duration;

/// Timing configuration for execution contexts.
///
/// # Examples
///
/// ```rust
/// use shell_link::EngineTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = EngineTimeouts::default();
///
/// // Show the "waiting" indicator sooner
/// let timeouts = EngineTimeouts::builder()
///     .wait_threshold(Duration::from_millis(200))
///     .build();
///
/// // Short lag for tests and local development
/// let timeouts = EngineTimeouts::fast();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineTimeouts {
    /// Time a submitted context stays `Pending` before it is reported as
    /// `Waiting`, provided no result data arrived in between.
    /// Default: 500 milliseconds
    pub wait_threshold: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            wait_threshold: Duration::from_millis(500),
        }
    }
}

impl EngineTimeouts {
    /// Create a new builder for custom timing configuration.
    pub fn builder() -> EngineTimeoutsBuilder {
        EngineTimeoutsBuilder::new()
    }

    /// Timings for tests and local development.
    pub fn fast() -> Self {
        Self {
            wait_threshold: Duration::from_millis(50),
        }
    }
}

/// Builder for creating custom [`EngineTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct EngineTimeoutsBuilder {
    timeouts: EngineTimeouts,
}

impl EngineTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: EngineTimeouts::default(),
        }
    }

    /// Set the `Pending -> Waiting` lag.
    pub fn wait_threshold(mut self, threshold: Duration) -> Self {
        self.timeouts.wait_threshold = threshold;
        self
    }

    /// Set the `Pending -> Waiting` lag in milliseconds.
    pub fn wait_threshold_ms(self, ms: u64) -> Self {
        self.wait_threshold(Duration::from_millis(ms))
    }

    /// Build the timing configuration.
    pub fn build(self) -> EngineTimeouts {
        self.timeouts
    }
}
