//! Staleness and ordering control for inbound results.
//!
//! The service echoes each frame's submission timestamp, but the network
//! may deliver results out of order relative to submission. This filter is
//! the only defense: a result must be strictly newer than the last one
//! rendered and must not be older than an age ceiling, or it is dropped
//! before it reaches the renderer.

use std::time::Duration;

use tracing::debug;

/// Decides whether an inbound result is still worth rendering.
///
/// Acceptance is monotonic: once a timestamp is accepted it becomes the
/// floor, and nothing at or below the floor ever passes again. Rejection
/// never mutates state.
#[derive(Debug, Default)]
pub struct StalenessFilter {
    last_accepted: Option<u64>,
}

impl StalenessFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the most recently accepted result, if any.
    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    /// Accept or reject a candidate result timestamp.
    ///
    /// Rejects when `candidate` is not strictly greater than the last
    /// accepted timestamp, or when it is more than `max_age` older than
    /// `now`. On acceptance the candidate becomes the new floor. A
    /// candidate clocked slightly ahead of `now` counts as age zero.
    pub fn accept(&mut self, candidate: u64, now: u64, max_age: Duration) -> bool {
        if let Some(last) = self.last_accepted {
            if candidate <= last {
                debug!(candidate, last, "result rejected: out of order");
                return false;
            }
        }

        let age = now.saturating_sub(candidate);
        if age > max_age.as_millis() as u64 {
            debug!(candidate, age, "result rejected: expired");
            return false;
        }

        self.last_accepted = Some(candidate);
        true
    }
}
