//! Shared deterministic types for the delegation protocol.
//!
//! These types define stable contracts between the coordinator, its agents and
//! the driver loop. They carry no synchronization and no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome reported by a resolution function or published by an agent.
///
/// Only [`GoalOutcome::Passed`] and [`GoalOutcome::Failed`] are terminal; the
/// driver re-polls a step for as long as it reports `Stopped` or `Executing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalOutcome {
    /// Not resolved yet; poll again later.
    Stopped,
    /// Work is in progress; poll again later.
    Executing,
    /// The goal succeeded.
    Passed,
    /// The goal did not succeed.
    Failed,
}

impl GoalOutcome {
    pub fn is_terminal(self) -> bool {
        matches!(self, GoalOutcome::Passed | GoalOutcome::Failed)
    }
}

impl fmt::Display for GoalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GoalOutcome::Stopped => "stopped",
            GoalOutcome::Executing => "executing",
            GoalOutcome::Passed => "passed",
            GoalOutcome::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Point-in-time snapshot of an agent's assignment slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    /// Goal currently assigned to the agent, `None` when idle.
    pub goal: Option<String>,
    /// Last outcome written to the slot.
    pub outcome: GoalOutcome,
    /// Goal whose outcome `outcome` is, once the agent has published one.
    pub completed: Option<String>,
}

impl SlotStatus {
    pub fn is_idle(&self) -> bool {
        self.goal.is_none()
    }
}

/// Declarative description of one plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Goal name; also the key of the step's work definition.
    pub goal: String,
    /// Agent the goal is delegated to. `None` runs the step inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl StepSpec {
    pub fn inline(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            agent: None,
        }
    }

    pub fn delegated(goal: &str, agent: &str) -> Self {
        Self {
            goal: goal.to_string(),
            agent: Some(agent.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_passed_and_failed_are_terminal() {
        assert!(!GoalOutcome::Stopped.is_terminal());
        assert!(!GoalOutcome::Executing.is_terminal());
        assert!(GoalOutcome::Passed.is_terminal());
        assert!(GoalOutcome::Failed.is_terminal());
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let json = serde_json::to_string(&GoalOutcome::Executing).expect("serialize");
        assert_eq!(json, "\"executing\"");
        let parsed: GoalOutcome = serde_json::from_str("\"failed\"").expect("parse");
        assert_eq!(parsed, GoalOutcome::Failed);
    }
}
