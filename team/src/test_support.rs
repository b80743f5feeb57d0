//! Test-only helpers: gated work bodies, scripted steps, polling helpers.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

use crate::agent::AgentLink;
use crate::core::types::{GoalOutcome, SlotStatus};
use crate::data::Data;
use crate::io::config::{TeamConfig, write_config};
use crate::step::GoalStep;
use crate::work::{WorkBody, WorkDefinition};

/// Work body that blocks until its [`Gate`] is released once per run.
pub struct GatedWork {
    release: Receiver<()>,
    outcome: GoalOutcome,
}

/// Releases a [`GatedWork`] body.
#[derive(Clone)]
pub struct Gate {
    release: Sender<()>,
}

impl GatedWork {
    pub fn new(outcome: GoalOutcome) -> (Self, Gate) {
        let (release, receiver) = mpsc::channel();
        (
            Self {
                release: receiver,
                outcome,
            },
            Gate { release },
        )
    }
}

impl WorkBody for GatedWork {
    fn perform(&mut self, _goal: &str) -> GoalOutcome {
        match self.release.recv_timeout(Duration::from_secs(30)) {
            Ok(()) => self.outcome,
            Err(_) => GoalOutcome::Failed,
        }
    }
}

impl Gate {
    pub fn release(&self) {
        // The body may already have given up; nothing left to release then.
        let _ = self.release.send(());
    }
}

/// Poll `agent` until its slot is idle, returning the final status.
pub fn wait_until_idle(agent: &AgentLink, timeout: Duration) -> Result<SlotStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        let status = agent.status();
        if status.is_idle() {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            return Err(anyhow!(
                "agent {} still busy after {:?}",
                agent.name(),
                timeout
            ));
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Shared log of `(goal, outcome)` pairs, one entry per `resolve` call.
pub type CallLog = Arc<Mutex<Vec<(String, GoalOutcome)>>>;

pub fn new_call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<(String, GoalOutcome)> {
    log.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Step that returns a scripted sequence of outcomes and records every call.
///
/// Once the script runs out the last outcome repeats.
pub struct ScriptedStep {
    goal: String,
    script: VecDeque<GoalOutcome>,
    last: GoalOutcome,
    log: CallLog,
}

impl ScriptedStep {
    pub fn new(goal: &str, script: Vec<GoalOutcome>, log: &CallLog) -> Self {
        Self {
            goal: goal.to_string(),
            script: script.into(),
            last: GoalOutcome::Stopped,
            log: Arc::clone(log),
        }
    }

    /// Step that passes on its first poll.
    pub fn passing(goal: &str, log: &CallLog) -> Self {
        Self::new(goal, vec![GoalOutcome::Passed], log)
    }
}

impl GoalStep for ScriptedStep {
    fn goal(&self) -> &str {
        &self.goal
    }

    fn resolve(&mut self, _data: &mut Data) -> Result<GoalOutcome> {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((self.goal.clone(), self.last));
        Ok(self.last)
    }
}

/// Team config with instant work bodies and millisecond polling.
pub fn fast_config() -> TeamConfig {
    let mut cfg = TeamConfig {
        silent: true,
        agent_idle_ms: 2,
        ..TeamConfig::default()
    };
    cfg.wait.interval_ms = 2;
    cfg.wait.max_interval_ms = 20;
    for definition in cfg.work.values_mut() {
        *definition = WorkDefinition {
            interval_ms: 1,
            ..definition.clone()
        };
    }
    cfg
}

/// Temporary directory holding a `team.toml`.
pub struct TempTeam {
    dir: tempfile::TempDir,
    config_path: PathBuf,
}

impl TempTeam {
    pub fn new(cfg: &TeamConfig) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("team.toml");
        write_config(&config_path, cfg)?;
        Ok(Self { dir, config_path })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
