//! Work bodies: the opaque, bounded units of work behind each goal name.
//!
//! The [`WorkBody`] trait decouples the protocol from what a goal actually
//! does. Agents look bodies up by goal name in a [`WorkRegistry`]; inline
//! steps run them on the coordinator thread. Tests use scripted bodies.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::types::GoalOutcome;

/// A bounded unit of work that ends with a terminal outcome.
pub trait WorkBody: Send {
    /// Perform the work for `goal` and return `Passed` or `Failed`.
    fn perform(&mut self, goal: &str) -> GoalOutcome;
}

impl<F> WorkBody for F
where
    F: FnMut(&str) -> GoalOutcome + Send,
{
    fn perform(&mut self, goal: &str) -> GoalOutcome {
        self(goal)
    }
}

/// Configured shape of an iteration-based work body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkDefinition {
    /// Text logged for every iteration.
    pub label: String,
    /// Number of iterations to run.
    pub iterations: u32,
    /// Pause after each iteration, in milliseconds.
    pub interval_ms: u64,
    /// Outcome reported once all iterations ran.
    pub outcome: GoalOutcome,
}

impl Default for WorkDefinition {
    fn default() -> Self {
        Self {
            label: "working".to_string(),
            iterations: 1,
            interval_ms: 1000,
            outcome: GoalOutcome::Passed,
        }
    }
}

impl WorkDefinition {
    pub fn new(label: &str, iterations: u32, interval_ms: u64) -> Self {
        Self {
            label: label.to_string(),
            iterations,
            interval_ms,
            outcome: GoalOutcome::Passed,
        }
    }
}

/// Runs a fixed number of iterations, sleeping between them.
#[derive(Debug, Clone)]
pub struct IterationWork {
    label: String,
    iterations: u32,
    interval: Duration,
    outcome: GoalOutcome,
}

impl IterationWork {
    pub fn from_definition(definition: &WorkDefinition) -> Self {
        Self {
            label: definition.label.clone(),
            iterations: definition.iterations,
            interval: Duration::from_millis(definition.interval_ms),
            outcome: definition.outcome,
        }
    }
}

impl WorkBody for IterationWork {
    fn perform(&mut self, goal: &str) -> GoalOutcome {
        for iteration in 0..self.iterations {
            info!(goal, iteration, "{} ...", self.label);
            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
        debug!(goal, outcome = %self.outcome, "work finished");
        self.outcome
    }
}

/// Work bodies keyed by goal name.
#[derive(Default)]
pub struct WorkRegistry {
    bodies: HashMap<String, Box<dyn WorkBody>>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry of [`IterationWork`] bodies from configured definitions.
    pub fn from_definitions<'a, I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a WorkDefinition)>,
    {
        let mut registry = Self::new();
        for (goal, definition) in definitions {
            registry.register(goal, IterationWork::from_definition(definition));
        }
        registry
    }

    pub fn register(&mut self, goal: &str, body: impl WorkBody + 'static) {
        self.bodies.insert(goal.to_string(), Box::new(body));
    }

    pub fn with(mut self, goal: &str, body: impl WorkBody + 'static) -> Self {
        self.register(goal, body);
        self
    }

    pub fn get_mut(&mut self, goal: &str) -> Option<&mut (dyn WorkBody + 'static)> {
        self.bodies.get_mut(goal).map(|body| body.as_mut())
    }

    pub fn contains(&self, goal: &str) -> bool {
        self.bodies.contains_key(goal)
    }

    /// Take the body for `goal` out of the registry.
    pub fn take(&mut self, goal: &str) -> Option<Box<dyn WorkBody>> {
        self.bodies.remove(goal)
    }
}
