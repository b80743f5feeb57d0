//! Goal-steps and their resolution functions.
//!
//! The driver polls [`GoalStep::resolve`] until it returns a terminal outcome.
//! A [`DelegatedStep`] hands its goal to an agent and watches the agent's slot;
//! an [`InlineStep`] does its bounded work on the coordinator thread.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::agent::AgentLink;
use crate::core::policy::{Decision, decide};
use crate::core::types::GoalOutcome;
use crate::data::Data;
use crate::error::ProtocolError;
use crate::work::WorkBody;

/// One named step of a plan.
pub trait GoalStep {
    /// Goal name identifying the step.
    fn goal(&self) -> &str;

    /// Agent the goal is delegated to, if any.
    fn agent(&self) -> Option<&str> {
        None
    }

    /// Poll the step once.
    ///
    /// `Stopped`/`Executing` ask the driver to re-poll later; `Passed`/`Failed`
    /// resolve the step.
    fn resolve(&mut self, data: &mut Data) -> Result<GoalOutcome>;
}

/// Guard against polling a step that already produced a terminal outcome.
#[derive(Debug, Default, Clone, Copy)]
struct Resolution(Option<GoalOutcome>);

impl Resolution {
    fn check(&self, goal: &str) -> Result<(), ProtocolError> {
        match self.0 {
            Some(outcome) => Err(ProtocolError::AlreadyResolved {
                goal: goal.to_string(),
                outcome,
            }),
            None => Ok(()),
        }
    }

    fn record(&mut self, outcome: GoalOutcome) -> GoalOutcome {
        if outcome.is_terminal() {
            self.0 = Some(outcome);
        }
        outcome
    }
}

/// Step whose goal is executed asynchronously by an agent.
#[derive(Debug)]
pub struct DelegatedStep {
    goal: String,
    agent: AgentLink,
    handed_off: bool,
    resolution: Resolution,
}

impl DelegatedStep {
    pub fn new(goal: &str, agent: AgentLink) -> Self {
        Self {
            goal: goal.to_string(),
            agent,
            handed_off: false,
            resolution: Resolution::default(),
        }
    }

    pub fn handed_off(&self) -> bool {
        self.handed_off
    }
}

impl GoalStep for DelegatedStep {
    fn goal(&self) -> &str {
        &self.goal
    }

    fn agent(&self) -> Option<&str> {
        Some(self.agent.name())
    }

    #[instrument(skip_all, fields(goal = %self.goal, agent = %self.agent.name()))]
    fn resolve(&mut self, _data: &mut Data) -> Result<GoalOutcome> {
        self.resolution.check(&self.goal)?;

        let status = self.agent.status();
        let outcome = match decide(&status, &self.goal, self.handed_off) {
            Decision::Wait => {
                debug!(outcome = %status.outcome, "agent busy, polling later");
                GoalOutcome::Stopped
            }
            Decision::HandOff => {
                self.agent.assign(&self.goal)?;
                self.handed_off = true;
                GoalOutcome::Stopped
            }
            Decision::Resolve(outcome) => outcome,
            Decision::Superseded => {
                return Err(ProtocolError::OutcomeSuperseded {
                    agent: self.agent.name().to_string(),
                    goal: self.goal.clone(),
                    completed: status.completed.unwrap_or_default(),
                }
                .into());
            }
        };
        Ok(self.resolution.record(outcome))
    }
}

/// Step performed synchronously by the coordinator.
pub struct InlineStep<F> {
    goal: String,
    run: F,
    resolution: Resolution,
}

impl<F> InlineStep<F>
where
    F: FnMut(&str, &mut Data) -> Result<GoalOutcome>,
{
    pub fn new(goal: &str, run: F) -> Self {
        Self {
            goal: goal.to_string(),
            run,
            resolution: Resolution::default(),
        }
    }
}

impl<F> GoalStep for InlineStep<F>
where
    F: FnMut(&str, &mut Data) -> Result<GoalOutcome>,
{
    fn goal(&self) -> &str {
        &self.goal
    }

    #[instrument(skip_all, fields(goal = %self.goal))]
    fn resolve(&mut self, data: &mut Data) -> Result<GoalOutcome> {
        self.resolution.check(&self.goal)?;
        let outcome = (self.run)(&self.goal, data)?;
        Ok(self.resolution.record(outcome))
    }
}

/// Inline step that runs a work body on the coordinator thread.
///
/// The returned step owns `body` and borrows nothing from `goal`.
pub fn inline_work(
    goal: &str,
    mut body: Box<dyn WorkBody>,
) -> InlineStep<impl FnMut(&str, &mut Data) -> Result<GoalOutcome> + use<>> {
    InlineStep::new(goal, move |goal: &str, _data: &mut Data| Ok(body.perform(goal)))
}

/// Inline step that resolves `Passed` on its first poll.
pub fn inline_pass(
    goal: &str,
) -> InlineStep<impl FnMut(&str, &mut Data) -> Result<GoalOutcome> + use<>> {
    InlineStep::new(goal, |_: &str, _: &mut Data| Ok(GoalOutcome::Passed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::agent::{Agent, AgentOptions};
    use crate::test_support::{GatedWork, wait_until_idle};
    use crate::work::WorkRegistry;

    fn spawn_gated(goal: &str) -> (crate::agent::AgentHandle, crate::test_support::Gate) {
        let (work, gate) = GatedWork::new(GoalOutcome::Passed);
        let registry = WorkRegistry::new().with(goal, work);
        let options = AgentOptions {
            idle_interval: Duration::from_millis(2),
        };
        let agent = Agent::spawn("marvin", registry, options, None).expect("spawn");
        (agent, gate)
    }

    #[test]
    fn delegated_step_hands_off_then_waits_then_resolves() {
        let (agent, gate) = spawn_gated("CONFIGURE");
        let mut step = DelegatedStep::new("CONFIGURE", agent.link());
        let mut data = Data::new();

        assert_eq!(step.resolve(&mut data).expect("poll"), GoalOutcome::Stopped);
        assert!(step.handed_off());
        assert_eq!(agent.status().goal.as_deref(), Some("CONFIGURE"));

        // Re-polling while executing never re-assigns.
        for _ in 0..5 {
            assert_eq!(step.resolve(&mut data).expect("poll"), GoalOutcome::Stopped);
        }

        gate.release();
        wait_until_idle(&agent.link(), Duration::from_secs(5)).expect("idle");
        assert_eq!(step.resolve(&mut data).expect("poll"), GoalOutcome::Passed);

        agent.shutdown().expect("shutdown");
    }

    #[test]
    fn delegated_step_waits_for_busy_agent_before_hand_off() {
        let (agent, gate) = spawn_gated("OTHER");
        agent.assign("OTHER").expect("assign other");

        let mut step = DelegatedStep::new("CONFIGURE", agent.link());
        let mut data = Data::new();
        assert_eq!(step.resolve(&mut data).expect("poll"), GoalOutcome::Stopped);
        assert!(!step.handed_off());

        gate.release();
        wait_until_idle(&agent.link(), Duration::from_secs(5)).expect("idle");
        assert_eq!(step.resolve(&mut data).expect("poll"), GoalOutcome::Stopped);
        assert!(step.handed_off());

        agent.shutdown().expect("shutdown");
    }

    #[test]
    fn resolving_twice_is_a_protocol_error() {
        let mut step = InlineStep::new("REPORT", |_: &str, _: &mut Data| Ok(GoalOutcome::Failed));
        let mut data = Data::new();
        assert_eq!(step.resolve(&mut data).expect("first"), GoalOutcome::Failed);

        let err = step.resolve(&mut data).unwrap_err();
        let protocol = err.downcast_ref::<ProtocolError>().expect("protocol error");
        assert!(matches!(protocol, ProtocolError::AlreadyResolved { .. }));
    }

    #[test]
    fn inline_work_performs_without_touching_data() {
        let body: Box<dyn WorkBody> = Box::new(|_: &str| GoalOutcome::Passed);
        let mut step = inline_work("WATCH", body);
        let mut data = Data::new();
        data.set("count", 0);

        assert_eq!(step.resolve(&mut data).expect("poll"), GoalOutcome::Passed);
        assert_eq!(data.get_as::<i64>("count").expect("count"), 0);
        assert_eq!(step.agent(), None);
    }

    #[test]
    fn inline_steps_outlive_the_goal_they_were_built_from() {
        let mut plan = crate::plan::Plan::new("owned");
        {
            let goal = String::from("REPORT");
            plan.push(inline_pass(&goal));
            let body: Box<dyn WorkBody> = Box::new(|_: &str| GoalOutcome::Failed);
            plan.push(inline_work(&format!("{goal}_AGAIN"), body));
        }
        assert_eq!(plan.goals(), vec!["REPORT", "REPORT_AGAIN"]);
    }

    #[test]
    fn outcome_overwritten_by_another_assignment_is_a_protocol_error() {
        let registry = WorkRegistry::new()
            .with("CONFIGURE", |_: &str| GoalOutcome::Passed)
            .with("OTHER", |_: &str| GoalOutcome::Failed);
        let options = AgentOptions {
            idle_interval: Duration::from_millis(2),
        };
        let agent = Agent::spawn("marvin", registry, options, None).expect("spawn");
        let mut step = DelegatedStep::new("CONFIGURE", agent.link());
        let mut data = Data::new();

        assert_eq!(step.resolve(&mut data).expect("hand off"), GoalOutcome::Stopped);
        wait_until_idle(&agent.link(), Duration::from_secs(5)).expect("idle");
        agent.link().assign("OTHER").expect("outside assign");
        wait_until_idle(&agent.link(), Duration::from_secs(5)).expect("idle again");

        let err = step.resolve(&mut data).unwrap_err();
        let protocol = err.downcast_ref::<ProtocolError>().expect("protocol error");
        assert_eq!(
            protocol,
            &ProtocolError::OutcomeSuperseded {
                agent: "marvin".to_string(),
                goal: "CONFIGURE".to_string(),
                completed: "OTHER".to_string(),
            }
        );

        agent.shutdown().expect("shutdown");
    }
}
