//! The coordinating team: owns the agents and the plan, and drives the plan.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, instrument, warn};

use crate::agent::{Agent, AgentHandle, AgentLink, AgentOptions};
use crate::data::Data;
use crate::error::ProtocolError;
use crate::io::config::TeamConfig;
use crate::looping::{DriverOptions, PlanOutcome, StepRecord, run_plan};
use crate::plan::Plan;
use crate::step::{DelegatedStep, inline_pass, inline_work};
use crate::wait::{Signal, WaitStrategy};
use crate::work::WorkRegistry;

/// Counter seeded to zero in the shared data before the plan runs.
pub const COUNT_VAR: &str = "count";

/// Supervising coordinator for a set of standing agents.
pub struct Team {
    name: String,
    agents: Vec<AgentHandle>,
    plan: Plan,
    options: DriverOptions,
    wait: Box<dyn WaitStrategy>,
    ran: bool,
}

impl Team {
    /// Assemble a team from already running agents and a plan.
    pub fn new(
        name: &str,
        agents: Vec<AgentHandle>,
        plan: Plan,
        options: DriverOptions,
        wait: Box<dyn WaitStrategy>,
    ) -> Self {
        Self {
            name: name.to_string(),
            agents,
            plan,
            options,
            wait,
            ran: false,
        }
    }

    /// Start the configured agents and register the configured plan.
    #[instrument(skip(cfg))]
    pub fn from_config(name: &str, cfg: &TeamConfig) -> Result<Self> {
        cfg.validate()?;
        let signal = Signal::new();
        let agent_options = AgentOptions {
            idle_interval: cfg.agent_idle_interval(),
        };

        let mut agents = Vec::with_capacity(cfg.agents.len());
        for agent_name in &cfg.agents {
            let registry = WorkRegistry::from_definitions(&cfg.work);
            let handle = Agent::spawn(
                agent_name,
                registry,
                agent_options.clone(),
                Some(Arc::clone(&signal)),
            )?;
            agents.push(handle);
        }
        info!(team = name, agents = agents.len(), "agents operating");

        let mut inline_bodies = WorkRegistry::from_definitions(&cfg.inline);
        let mut plan = Plan::new(name);
        for step in &cfg.steps {
            match &step.agent {
                Some(agent_name) => {
                    let link = find_link(&agents, agent_name).ok_or_else(|| {
                        ProtocolError::UnknownAgent {
                            goal: step.goal.clone(),
                            agent: agent_name.clone(),
                        }
                    })?;
                    plan.push(DelegatedStep::new(&step.goal, link));
                }
                None => match inline_bodies.take(&step.goal) {
                    Some(body) => plan.push(inline_work(&step.goal, body)),
                    None => plan.push(inline_pass(&step.goal)),
                },
            }
        }
        if let Some(final_goal) = &cfg.final_step {
            plan = plan.with_final_step(final_goal)?;
        }

        let options = DriverOptions {
            abort_on_failure: cfg.abort_on_failure,
            step_timeout: cfg.step_timeout(),
        };
        let wait = cfg.wait.build(&signal);
        info!(team = name, steps = plan.len(), "team created and ready");
        Ok(Self::new(name, agents, plan, options, wait))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn agent(&self, name: &str) -> Option<AgentLink> {
        find_link(&self.agents, name)
    }

    /// Drive the plan to completion.
    ///
    /// Returns `Ok(true)` once every step has been resolved or skipped; step
    /// failures are not folded into the result. Use [`Team::run_with`] for the
    /// per-step report.
    pub fn run(&mut self) -> Result<bool> {
        let outcome = self.run_with(|_| {})?;
        Ok(outcome.completed)
    }

    /// Drive the plan, calling `on_step` as each step finishes.
    #[instrument(skip_all, fields(team = %self.name))]
    pub fn run_with<F: FnMut(&StepRecord)>(&mut self, on_step: F) -> Result<PlanOutcome> {
        if self.ran {
            bail!("team {} has already run its plan", self.name);
        }
        self.ran = true;

        let mut data = Data::new();
        data.set(COUNT_VAR, 0);
        info!("instructing the team to perform its goals");

        let outcome = run_plan(
            &mut self.plan,
            &mut data,
            &self.options,
            self.wait.as_mut(),
            on_step,
        )
        .with_context(|| format!("run plan {}", self.name))?;
        if outcome.failed() > 0 {
            warn!(failed = outcome.failed(), "plan completed with failed steps");
        }
        Ok(outcome)
    }

    /// Stop every agent and wait for their threads to exit.
    pub fn shutdown(self) -> Result<()> {
        let mut first_error = None;
        for agent in self.agents {
            let name = agent.name().to_string();
            if let Err(err) = agent.shutdown() {
                warn!(agent = %name, err = %err, "agent shutdown failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn find_link(agents: &[AgentHandle], name: &str) -> Option<AgentLink> {
    agents
        .iter()
        .find(|agent| agent.name() == name)
        .map(AgentHandle::link)
}
