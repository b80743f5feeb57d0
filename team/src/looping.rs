//! Driver loop that polls each step of a plan until it resolves.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::{remaining_budget, step_deadline};
use crate::core::types::GoalOutcome;
use crate::data::Data;
use crate::plan::Plan;
use crate::step::GoalStep;
use crate::wait::WaitStrategy;

/// Knobs for how the driver treats failed and stalled steps.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// After a `Failed` step, skip everything except the plan's final step.
    pub abort_on_failure: bool,
    /// Resolve a step as `Failed` when it is still pending after this long.
    pub step_timeout: Option<Duration>,
}

/// What happened to one step of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub goal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Terminal outcome, `None` when the step was skipped.
    pub outcome: Option<GoalOutcome>,
    /// Number of `resolve` calls made for the step.
    pub polls: u32,
    pub elapsed_ms: u64,
    /// The step hit its deadline and was failed by the driver.
    pub timed_out: bool,
    /// The step never ran because an earlier step failed.
    pub skipped: bool,
}

/// Summary of a plan execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    pub plan: String,
    /// Always true once `run_plan` returns; failed steps do not change it.
    pub completed: bool,
    pub steps: Vec<StepRecord>,
    pub elapsed_ms: u64,
}

impl PlanOutcome {
    pub fn passed(&self) -> usize {
        self.count(Some(GoalOutcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(Some(GoalOutcome::Failed))
    }

    pub fn skipped(&self) -> usize {
        self.steps.iter().filter(|step| step.skipped).count()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.steps.len()
    }

    fn count(&self, outcome: Option<GoalOutcome>) -> usize {
        self.steps
            .iter()
            .filter(|step| step.outcome == outcome)
            .count()
    }
}

/// Drive every step of `plan` in order until each reaches a terminal outcome.
///
/// A step is re-polled, with `wait` between polls, for as long as it reports
/// `Stopped` or `Executing`. A failed step does not stop the plan unless
/// `options.abort_on_failure` is set. Protocol violations abort with an error.
#[instrument(skip_all, fields(plan = %plan.name(), steps = plan.len()))]
pub fn run_plan<F: FnMut(&StepRecord)>(
    plan: &mut Plan,
    data: &mut Data,
    options: &DriverOptions,
    wait: &mut dyn WaitStrategy,
    mut on_step: F,
) -> Result<PlanOutcome> {
    let started = Instant::now();
    let plan_name = plan.name().to_string();
    let final_index = plan.final_index();
    let mut records = Vec::with_capacity(plan.len());
    let mut aborted = false;

    for (index, step) in plan.steps_mut().iter_mut().enumerate() {
        let record = if aborted && Some(index) != final_index {
            debug!(goal = step.goal(), "skipping step after failure");
            skipped_record(index, &**step)
        } else {
            wait.reset();
            let record = drive_step(index, &mut **step, data, options, wait)?;
            if options.abort_on_failure
                && !aborted
                && record.outcome == Some(GoalOutcome::Failed)
            {
                warn!(goal = %record.goal, "step failed, skipping to the final step");
                aborted = true;
            }
            record
        };
        on_step(&record);
        records.push(record);
    }

    let outcome = PlanOutcome {
        plan: plan_name,
        completed: true,
        steps: records,
        elapsed_ms: elapsed_ms(started),
    };
    info!(
        passed = outcome.passed(),
        failed = outcome.failed(),
        skipped = outcome.skipped(),
        "plan completed"
    );
    Ok(outcome)
}

fn drive_step(
    index: usize,
    step: &mut dyn GoalStep,
    data: &mut Data,
    options: &DriverOptions,
    wait: &mut dyn WaitStrategy,
) -> Result<StepRecord> {
    let goal = step.goal().to_string();
    let agent = step.agent().map(str::to_string);
    let started = Instant::now();
    let deadline = step_deadline(started, options.step_timeout);
    info!(goal = %goal, agent = ?agent, "starting step");

    let mut polls = 0u32;
    loop {
        polls += 1;
        let outcome = step
            .resolve(data)
            .with_context(|| format!("resolve step {goal}"))?;
        debug!(goal = %goal, polls, %outcome, "polled step");

        if outcome.is_terminal() {
            info!(goal = %goal, %outcome, polls, "step resolved");
            return Ok(StepRecord {
                index,
                goal,
                agent,
                outcome: Some(outcome),
                polls,
                elapsed_ms: elapsed_ms(started),
                timed_out: false,
                skipped: false,
            });
        }

        if let Some(deadline) = deadline {
            if remaining_budget(deadline).is_none() {
                warn!(goal = %goal, polls, "step timed out, marking failed");
                return Ok(StepRecord {
                    index,
                    goal,
                    agent,
                    outcome: Some(GoalOutcome::Failed),
                    polls,
                    elapsed_ms: elapsed_ms(started),
                    timed_out: true,
                    skipped: false,
                });
            }
        }

        wait.wait(polls);
    }
}

fn skipped_record(index: usize, step: &dyn GoalStep) -> StepRecord {
    StepRecord {
        index,
        goal: step.goal().to_string(),
        agent: step.agent().map(str::to_string),
        outcome: None,
        polls: 0,
        elapsed_ms: 0,
        timed_out: false,
        skipped: true,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::step::InlineStep;
    use crate::test_support::{ScriptedStep, calls, new_call_log};
    use crate::wait::FixedDelay;

    fn no_wait() -> FixedDelay {
        FixedDelay::new(Duration::ZERO)
    }

    #[test]
    fn single_inline_step_completes_after_one_poll() {
        let log = new_call_log();
        let mut plan = Plan::new("a").step(ScriptedStep::passing("only", &log));

        let outcome = run_plan(
            &mut plan,
            &mut Data::new(),
            &DriverOptions::default(),
            &mut no_wait(),
            |_| {},
        )
        .expect("run");

        assert!(outcome.completed);
        assert_eq!(outcome.steps[0].polls, 1);
        assert_eq!(calls(&log), vec![("only".to_string(), GoalOutcome::Passed)]);
    }

    #[test]
    fn steps_run_in_order_and_are_never_polled_after_resolving() {
        let log = new_call_log();
        let mut plan = Plan::new("ordered")
            .step(ScriptedStep::new(
                "s0",
                vec![GoalOutcome::Stopped, GoalOutcome::Executing, GoalOutcome::Passed],
                &log,
            ))
            .step(ScriptedStep::new(
                "s1",
                vec![GoalOutcome::Stopped, GoalOutcome::Failed],
                &log,
            ))
            .step(ScriptedStep::passing("s2", &log))
            .step(ScriptedStep::passing("s3", &log));

        let outcome = run_plan(
            &mut plan,
            &mut Data::new(),
            &DriverOptions::default(),
            &mut no_wait(),
            |_| {},
        )
        .expect("run");

        let goals: Vec<String> = calls(&log).into_iter().map(|(goal, _)| goal).collect();
        assert_eq!(goals, vec!["s0", "s0", "s0", "s1", "s1", "s2", "s3"]);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.passed(), 3);
    }

    #[test]
    fn failure_does_not_short_circuit_by_default() {
        let log = new_call_log();
        let mut plan = Plan::new("c")
            .step(ScriptedStep::passing("s0", &log))
            .step(ScriptedStep::new("s1", vec![GoalOutcome::Failed], &log))
            .step(ScriptedStep::passing("s2", &log))
            .step(ScriptedStep::passing("s3", &log));

        let outcome = run_plan(
            &mut plan,
            &mut Data::new(),
            &DriverOptions::default(),
            &mut no_wait(),
            |_| {},
        )
        .expect("run");

        assert_eq!(calls(&log).len(), 4);
        assert_eq!(outcome.skipped(), 0);
        assert!(outcome.completed);
    }

    #[test]
    fn abort_on_failure_skips_to_final_step() {
        let log = new_call_log();
        let mut plan = Plan::new("c")
            .step(ScriptedStep::passing("s0", &log))
            .step(ScriptedStep::new("s1", vec![GoalOutcome::Failed], &log))
            .step(ScriptedStep::passing("s2", &log))
            .step(ScriptedStep::passing("s3", &log));
        let options = DriverOptions {
            abort_on_failure: true,
            ..DriverOptions::default()
        };
        let mut seen = Vec::new();

        let outcome = run_plan(&mut plan, &mut Data::new(), &options, &mut no_wait(), |record| {
            seen.push((record.goal.clone(), record.skipped));
        })
        .expect("run");

        let goals: Vec<String> = calls(&log).into_iter().map(|(goal, _)| goal).collect();
        assert_eq!(goals, vec!["s0", "s1", "s3"]);
        assert_eq!(
            seen,
            vec![
                ("s0".to_string(), false),
                ("s1".to_string(), false),
                ("s2".to_string(), true),
                ("s3".to_string(), false),
            ]
        );
        assert_eq!(outcome.steps[2].outcome, None);
        assert!(outcome.completed);
    }

    #[test]
    fn pending_step_fails_at_deadline() {
        let log = new_call_log();
        let mut plan = Plan::new("stuck")
            .step(ScriptedStep::new("stuck", vec![GoalOutcome::Executing], &log))
            .step(ScriptedStep::passing("after", &log));
        let options = DriverOptions {
            step_timeout: Some(Duration::from_millis(20)),
            ..DriverOptions::default()
        };

        let outcome = run_plan(
            &mut plan,
            &mut Data::new(),
            &options,
            &mut FixedDelay::new(Duration::from_millis(2)),
            |_| {},
        )
        .expect("run");

        assert!(outcome.steps[0].timed_out);
        assert_eq!(outcome.steps[0].outcome, Some(GoalOutcome::Failed));
        assert!(outcome.steps[0].polls > 1);
        assert_eq!(outcome.steps[1].outcome, Some(GoalOutcome::Passed));
    }

    #[test]
    fn protocol_error_aborts_the_run() {
        let mut plan = Plan::new("broken").step(InlineStep::new(
            "bad",
            |goal: &str, _: &mut Data| -> Result<GoalOutcome> {
                Err(ProtocolError::AlreadyResolved {
                    goal: goal.to_string(),
                    outcome: GoalOutcome::Passed,
                }
                .into())
            },
        ));

        let err = run_plan(
            &mut plan,
            &mut Data::new(),
            &DriverOptions::default(),
            &mut no_wait(),
            |_| {},
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("resolve step bad"));
        assert!(err.downcast_ref::<ProtocolError>().is_some());
    }
}
