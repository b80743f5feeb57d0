//! Decision policy for steps delegated to an agent.

use crate::core::types::{GoalOutcome, SlotStatus};

/// What a delegated step should do on one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the agent alone and report `Stopped`.
    Wait,
    /// The agent is idle and the goal has not been handed off yet.
    HandOff,
    /// The agent finished this step's goal with a terminal outcome.
    Resolve(GoalOutcome),
    /// After hand-off the slot shows another goal's outcome; ours was overwritten.
    Superseded,
}

/// Decide the next action for a delegated step.
///
/// The `Executing` check comes first so that re-polling before completion can
/// never hand the same goal off twice. A terminal outcome only resolves `goal`
/// when the slot says it was published for `goal`.
pub fn decide(status: &SlotStatus, goal: &str, handed_off: bool) -> Decision {
    if status.outcome == GoalOutcome::Executing {
        return Decision::Wait;
    }
    if !status.is_idle() {
        // Assigned but not marked executing; only reachable mid-transition.
        return Decision::Wait;
    }
    if !handed_off {
        return Decision::HandOff;
    }
    if !status.outcome.is_terminal() {
        return Decision::Wait;
    }
    match status.completed.as_deref() {
        Some(completed) if completed == goal => Decision::Resolve(status.outcome),
        _ => Decision::Superseded,
    }
}
