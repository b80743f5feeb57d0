//! Typed errors for hand-off protocol violations.

use thiserror::Error;

use crate::core::types::GoalOutcome;

/// Violations of the hand-off protocol between the coordinator and its agents.
///
/// These are programming defects rather than work failures: the driver aborts
/// the run when one surfaces instead of treating it as a step outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("agent {agent} is busy with {current} (refused {requested})")]
    AgentBusy {
        agent: String,
        current: String,
        requested: String,
    },

    #[error("goal name must not be empty")]
    EmptyGoalName,

    #[error("agent {agent} has no goal assigned")]
    NotAssigned { agent: String },

    #[error("agent {agent} tried to publish non-terminal outcome {outcome}")]
    NonTerminalPublish { agent: String, outcome: GoalOutcome },

    #[error("step {goal} was polled again after resolving {outcome}")]
    AlreadyResolved { goal: String, outcome: GoalOutcome },

    #[error("agent {agent} published {completed} after step {goal} was handed off; its outcome is lost")]
    OutcomeSuperseded {
        agent: String,
        goal: String,
        completed: String,
    },

    #[error("step {goal} references unknown agent {agent}")]
    UnknownAgent { goal: String, agent: String },
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
