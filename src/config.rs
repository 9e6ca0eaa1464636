//! # Per-environment runtime configuration.
//!
//! [`Config`] defines an environment's behavior: mailbox capacity, the
//! recovery budget applied to panicking behaviors, and the emit fan-out
//! policy.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use cellmesh::{Config, EmitPolicy};
//!
//! let mut cfg = Config::default();
//! cfg.queue_capacity = 64;
//! cfg.recover_limit = 3;
//! cfg.recover_window = Duration::from_secs(10);
//! cfg.emit = EmitPolicy::CollectAndContinue;
//!
//! assert_eq!(cfg.queue_capacity, 64);
//! ```

use std::time::Duration;

/// Policy controlling how an emit fans out to subscribers when a push fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitPolicy {
    /// Abort the fan-out at the first failing subscriber and return that
    /// error; later subscribers do not receive the event (default).
    FailFast,
    /// Deliver to every subscriber regardless of individual failures and
    /// return the first error encountered, if any.
    CollectAndContinue,
}

impl Default for EmitPolicy {
    /// Returns [`EmitPolicy::FailFast`].
    fn default() -> Self {
        EmitPolicy::FailFast
    }
}

/// Configuration for an environment and the cells it starts.
///
/// Controls mailbox sizing, the panic recovery budget, and emit fan-out.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of each cell's bounded mailbox.
    pub queue_capacity: usize,
    /// Number of caught panics within [`recover_window`](Config::recover_window)
    /// after which a cell is terminated with `RecoveredTooOften`.
    pub recover_limit: usize,
    /// Sliding window over which caught panics are counted.
    pub recover_window: Duration,
    /// Fan-out policy applied by [`Context::emit`](crate::Context::emit).
    pub emit: EmitPolicy,
}

impl Default for Config {
    /// Provides the default configuration:
    /// - `queue_capacity = 256`
    /// - `recover_limit = 12`
    /// - `recover_window = 60s`
    /// - `emit = EmitPolicy::FailFast`
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            recover_limit: 12,
            recover_window: Duration::from_secs(60),
            emit: EmitPolicy::default(),
        }
    }
}
