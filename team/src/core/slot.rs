//! Pure state machine for an agent's single assignment slot.
//!
//! The synchronized cell in [`crate::agent`] wraps this type; every transition
//! rule lives here so it can be tested without threads.

use crate::core::types::{GoalOutcome, SlotStatus};
use crate::error::{ProtocolError, ProtocolResult};

/// `(goal, outcome)` pair owned by one agent.
///
/// Created idle with outcome `Stopped`. The coordinator writes a goal only
/// while the slot is idle; the agent clears it when it publishes the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    goal: Option<String>,
    outcome: GoalOutcome,
    completed: Option<String>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            goal: None,
            outcome: GoalOutcome::Stopped,
            completed: None,
        }
    }
}

impl Slot {
    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    pub fn outcome(&self) -> GoalOutcome {
        self.outcome
    }

    /// Goal the visible outcome belongs to.
    pub fn completed(&self) -> Option<&str> {
        self.completed.as_deref()
    }

    pub fn status(&self) -> SlotStatus {
        SlotStatus {
            goal: self.goal.clone(),
            outcome: self.outcome,
            completed: self.completed.clone(),
        }
    }

    /// Hand `goal` to the agent. Rejected unless the slot is idle.
    pub fn try_assign(&mut self, agent: &str, goal: &str) -> ProtocolResult<()> {
        if goal.trim().is_empty() {
            return Err(ProtocolError::EmptyGoalName);
        }
        if let Some(current) = &self.goal {
            return Err(ProtocolError::AgentBusy {
                agent: agent.to_string(),
                current: current.clone(),
                requested: goal.to_string(),
            });
        }
        self.goal = Some(goal.to_string());
        self.outcome = GoalOutcome::Executing;
        self.completed = None;
        Ok(())
    }

    /// Record the terminal outcome of the assigned goal and clear the goal name.
    ///
    /// Returns the goal that was completed.
    pub fn publish(&mut self, agent: &str, outcome: GoalOutcome) -> ProtocolResult<String> {
        if !outcome.is_terminal() {
            return Err(ProtocolError::NonTerminalPublish {
                agent: agent.to_string(),
                outcome,
            });
        }
        let goal = self.goal.take().ok_or_else(|| ProtocolError::NotAssigned {
            agent: agent.to_string(),
        })?;
        self.outcome = outcome;
        self.completed = Some(goal.clone());
        Ok(goal)
    }
}
