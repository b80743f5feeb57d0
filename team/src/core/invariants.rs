//! Structural invariants of a plan, checked before any agent is started.

use std::collections::HashSet;

use crate::core::types::StepSpec;

/// Check plan wiring:
/// - At least one step
/// - No empty or duplicate goal names
/// - Delegated steps name a known agent
/// - The final step, when named, is part of the plan
pub fn validate_plan(
    steps: &[StepSpec],
    agents: &[String],
    final_step: Option<&str>,
) -> Vec<String> {
    let mut errors = Vec::new();
    if steps.is_empty() {
        errors.push("plan must contain at least one step".to_string());
    }

    let known_agents: HashSet<&str> = agents.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    for (index, step) in steps.iter().enumerate() {
        if step.goal.trim().is_empty() {
            errors.push(format!("step {index}: goal name must not be empty"));
            continue;
        }
        if !seen.insert(step.goal.as_str()) {
            errors.push(format!("duplicate goal '{}' at step {index}", step.goal));
        }
        match &step.agent {
            Some(agent) if !known_agents.contains(agent.as_str()) => {
                errors.push(format!(
                    "step {index} ({}): unknown agent '{agent}'",
                    step.goal
                ));
            }
            _ => {}
        }
    }

    if let Some(final_goal) = final_step {
        if !steps.iter().any(|step| step.goal == final_goal) {
            errors.push(format!("final step '{final_goal}' is not part of the plan"));
        }
    }

    errors
}
