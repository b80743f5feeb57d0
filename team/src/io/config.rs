//! Team configuration stored in `team.toml`.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::core::invariants::validate_plan;
use crate::core::types::StepSpec;
use crate::wait::WaitConfig;
use crate::work::WorkDefinition;

pub const CONFIGURE_DIAGNOSTICS: &str = "CONFIGURE_DIAGNOSTICS";
pub const WATCH_FOR_FAULTS: &str = "WATCH_FOR_FAULTS";
pub const DIAGNOSE_FAULTS: &str = "DIAGNOSE_FAULTS";
pub const REPORT_FAULTS: &str = "REPORT_FAULTS";
pub const DEFAULT_AGENT: &str = "Marvin";

/// Team configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to the
/// diagnostic team: one agent configuring diagnostics while the coordinator
/// watches, diagnoses and reports inline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TeamConfig {
    /// Silence all log output.
    pub silent: bool,

    /// Skip to `final_step` as soon as a step fails.
    pub abort_on_failure: bool,

    /// Per-step deadline in seconds; `0` lets a step poll forever.
    pub step_timeout_secs: u64,

    /// Sleep between checks of an idle agent slot, in milliseconds.
    pub agent_idle_ms: u64,

    /// Names of the agents to start.
    pub agents: Vec<String>,

    /// Reporting step that still runs when `abort_on_failure` skips the rest.
    /// Defaults to the last step when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_step: Option<String>,

    pub wait: WaitConfig,

    /// Ordered plan.
    pub steps: Vec<StepSpec>,

    /// Work every agent can perform, keyed by goal name.
    pub work: BTreeMap<String, WorkDefinition>,

    /// Work run on the coordinator thread for inline steps. An inline step
    /// without an entry passes on its first poll.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inline: BTreeMap<String, WorkDefinition>,
}

impl Default for TeamConfig {
    fn default() -> Self {
        let mut work = BTreeMap::new();
        work.insert(
            CONFIGURE_DIAGNOSTICS.to_string(),
            WorkDefinition::new("configuring stuff", 5, 1000),
        );
        work.insert(
            WATCH_FOR_FAULTS.to_string(),
            WorkDefinition::new("hunting for faults", 10, 1000),
        );
        work.insert(
            DIAGNOSE_FAULTS.to_string(),
            WorkDefinition::new("diagnosing a specific fault", 10, 1000),
        );
        work.insert(
            REPORT_FAULTS.to_string(),
            WorkDefinition::new("preparing diagnosis report", 2, 1000),
        );

        Self {
            silent: false,
            abort_on_failure: false,
            step_timeout_secs: 0,
            agent_idle_ms: 1000,
            agents: vec![DEFAULT_AGENT.to_string()],
            final_step: Some(REPORT_FAULTS.to_string()),
            wait: WaitConfig::default(),
            steps: vec![
                StepSpec::delegated(CONFIGURE_DIAGNOSTICS, DEFAULT_AGENT),
                StepSpec::inline(WATCH_FOR_FAULTS),
                StepSpec::inline(DIAGNOSE_FAULTS),
                StepSpec::inline(REPORT_FAULTS),
            ],
            work,
            inline: BTreeMap::new(),
        }
    }
}

impl TeamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agent_idle_ms == 0 {
            return Err(anyhow!("agent_idle_ms must be > 0"));
        }
        if self.wait.interval_ms == 0 {
            return Err(anyhow!("wait.interval_ms must be > 0"));
        }
        if self.wait.max_interval_ms < self.wait.interval_ms {
            return Err(anyhow!("wait.max_interval_ms must be >= wait.interval_ms"));
        }

        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.trim().is_empty() {
                return Err(anyhow!("agent names must not be empty"));
            }
            if !names.insert(agent.as_str()) {
                return Err(anyhow!("duplicate agent '{agent}'"));
            }
        }

        for (table, definitions) in [("work", &self.work), ("inline", &self.inline)] {
            for (goal, definition) in definitions {
                if !definition.outcome.is_terminal() {
                    return Err(anyhow!(
                        "{table}.{goal}.outcome must be passed or failed (got {})",
                        definition.outcome
                    ));
                }
            }
        }
        for step in self.steps.iter().filter(|step| step.agent.is_some()) {
            if !self.work.contains_key(&step.goal) {
                return Err(anyhow!(
                    "delegated step '{}' has no [work.{}] entry",
                    step.goal,
                    step.goal
                ));
            }
        }

        let errors = validate_plan(&self.steps, &self.agents, self.final_step.as_deref());
        if !errors.is_empty() {
            bail!("invalid plan:\n- {}", errors.join("\n- "));
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }

    pub fn agent_idle_interval(&self) -> Duration {
        Duration::from_millis(self.agent_idle_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TeamConfig::default()`.
pub fn load_config(path: &Path) -> Result<TeamConfig> {
    if !path.exists() {
        let cfg = TeamConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TeamConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TeamConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
