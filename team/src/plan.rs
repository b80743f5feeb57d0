//! Ordered plan of goal-steps.

use anyhow::{Result, anyhow};

use crate::step::GoalStep;

/// Steps executed strictly in sequence by the driver loop.
pub struct Plan {
    name: String,
    steps: Vec<Box<dyn GoalStep>>,
    final_step: Option<usize>,
}

impl Plan {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
            final_step: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&mut self, step: impl GoalStep + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn push_boxed(&mut self, step: Box<dyn GoalStep>) {
        self.steps.push(step);
    }

    pub fn step(mut self, step: impl GoalStep + 'static) -> Self {
        self.push(step);
        self
    }

    /// Designate the reporting step that survives `abort_on_failure`.
    pub fn with_final_step(mut self, goal: &str) -> Result<Self> {
        let index = self
            .steps
            .iter()
            .position(|step| step.goal() == goal)
            .ok_or_else(|| anyhow!("final step '{goal}' is not part of plan {}", self.name))?;
        self.final_step = Some(index);
        Ok(self)
    }

    /// Index of the final reporting step; the last step unless designated.
    pub fn final_index(&self) -> Option<usize> {
        self.final_step.or_else(|| self.steps.len().checked_sub(1))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn goals(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.goal()).collect()
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [Box<dyn GoalStep>] {
        &mut self.steps
    }

    pub fn steps(&self) -> &[Box<dyn GoalStep>] {
        &self.steps
    }
}
