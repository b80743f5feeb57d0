//! Per-step time budget helpers for the driver loop.

use std::time::{Duration, Instant};

/// Remaining time until `deadline`, or `None` once it has passed.
pub fn remaining_budget(deadline: Instant) -> Option<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return None;
    }
    Some(remaining)
}

/// Deadline for a step started at `started`, if the step has a timeout.
///
/// A timeout too large to represent as an `Instant` means no deadline.
pub fn step_deadline(started: Instant, timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|timeout| started.checked_add(timeout))
}
