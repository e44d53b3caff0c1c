//! Clock abstraction for deterministic testing.
//!
//! Decouples the session state machine from wall-clock time so idle
//! timeouts and activity tracking can be exercised with a fake clock in
//! unit tests. Unlike a full environment abstraction, the core has no need
//! for randomness or sleeping: those are I/O-executor concerns owned by the
//! gateway's connection loop.

use std::time::Duration;

/// Provides monotonic time to the session state machine.
pub trait Clock: Clone + Send + Sync + 'static {
    /// The instant type produced by this clock.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time. Must never go backwards within a process lifetime.
    fn now(&self) -> Self::Instant;
}
