//! Realization settings supplied by the caller.

use std::time::Duration;

use thiserror::Error;

use crate::model::DeleteOptions;

/// Default wait before the first state query.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default minimum interval between state queries.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("realization timeout must be greater than zero")]
    ZeroTimeout,

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("max poll interval {max:?} is shorter than min poll interval {min:?}")]
    IntervalRange { min: Duration, max: Duration },
}

/// How the poller treats a state query that fails in transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportErrorPolicy {
    /// Abort polling on the first transport error.
    #[default]
    Abort,
    /// Treat up to `max_consecutive` back-to-back transport errors as a
    /// pending round; the next one aborts.
    Tolerate { max_consecutive: u32 },
}

/// Timing and failure policy for create-and-verify.
///
/// There is no default timeout; callers always choose the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealizationConfig {
    /// Total polling budget, measured from the start of the poll loop.
    pub timeout: Duration,
    pub initial_delay: Duration,
    pub min_interval: Duration,
    /// When set, the interval doubles after each pending round up to this cap.
    pub max_interval: Option<Duration>,
    pub transport_errors: TransportErrorPolicy,
    /// Poll for realization after create. Disabling returns the handle as soon
    /// as the controller accepts the create.
    pub verify: bool,
    /// Flags used for the compensating delete.
    pub rollback_delete: DeleteOptions,
}

impl RealizationConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            initial_delay: DEFAULT_INITIAL_DELAY,
            min_interval: DEFAULT_MIN_INTERVAL,
            max_interval: None,
            transport_errors: TransportErrorPolicy::Abort,
            verify: true,
            rollback_delete: DeleteOptions::default(),
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = Some(interval);
        self
    }

    pub fn with_transport_errors(mut self, policy: TransportErrorPolicy) -> Self {
        self.transport_errors = policy;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_rollback_delete(mut self, options: DeleteOptions) -> Self {
        self.rollback_delete = options;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.min_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if let Some(max) = self.max_interval {
            if max < self.min_interval {
                return Err(ConfigError::IntervalRange {
                    min: self.min_interval,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Interval to sleep after `interval` when the next round is still pending.
    pub(crate) fn next_interval(&self, interval: Duration) -> Duration {
        match self.max_interval {
            Some(max) => interval.saturating_mul(2).min(max),
            None => self.min_interval,
        }
    }
}
