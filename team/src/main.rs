//! Goal-delegation team runner.
//!
//! Builds a coordinator from `team.toml` (or built-in defaults), starts its
//! agents, and drives the plan of goals to completion.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use team::coordinator::Team;
use team::exit_codes;
use team::io::config::{TeamConfig, load_config, write_config};
use team::io::report::write_report;
use team::logging;
use team::looping::StepRecord;

const TEAM_NAME: &str = "diagnosticTeam";

#[derive(Parser)]
#[command(
    name = "team",
    version,
    about = "Drive a plan of goals through a team of standing agents"
)]
struct Cli {
    /// Path to the team configuration file.
    #[arg(short, long, global = true, default_value = "team.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the agents and run the plan (the default).
    Run {
        /// Silence all log output.
        #[arg(short, long)]
        silent: bool,
        /// Write a JSON report of every step to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Check the configuration and plan wiring without starting agents.
    Validate,
    /// Print the ordered plan steps and the agent each is delegated to.
    Plan,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run {
        silent: false,
        report: None,
    });
    match command {
        Command::Run { silent, report } => cmd_run(&cli.config, silent, report.as_deref()),
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Validate => cmd_validate(&cli.config),
        Command::Plan => cmd_plan(&cli.config),
    }
}

fn cmd_run(config_path: &Path, silent: bool, report: Option<&Path>) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let silent = silent || cfg.silent;
    logging::init(silent);

    let mut team = Team::from_config(TEAM_NAME, &cfg).context("create team")?;
    let outcome = team.run_with(|record| {
        if !silent {
            println!("{}", render_record(record));
        }
    })?;
    team.shutdown().context("stop agents")?;

    if let Some(path) = report {
        write_report(path, &outcome)?;
    }
    if !silent {
        println!("Exiting {}.", TEAM_NAME);
    }
    Ok(exit_codes::OK)
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &TeamConfig::default())
        .with_context(|| format!("write {}", config_path.display()))?;
    Ok(exit_codes::OK)
}

fn cmd_validate(config_path: &Path) -> Result<i32> {
    load_config(config_path)?;
    Ok(exit_codes::OK)
}

fn cmd_plan(config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    for line in render_plan(&cfg) {
        println!("{line}");
    }
    Ok(exit_codes::OK)
}

fn render_plan(cfg: &TeamConfig) -> Vec<String> {
    let final_goal = cfg
        .final_step
        .as_deref()
        .or_else(|| cfg.steps.last().map(|step| step.goal.as_str()));
    cfg.steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let owner = step.agent.as_deref().unwrap_or("inline");
            let marker = if Some(step.goal.as_str()) == final_goal {
                " (final)"
            } else {
                ""
            };
            format!("{index}. {} -> {owner}{marker}", step.goal)
        })
        .collect()
}

fn render_record(record: &StepRecord) -> String {
    match record.outcome {
        Some(outcome) if record.timed_out => {
            format!("{}: {outcome} (timed out after {} polls)", record.goal, record.polls)
        }
        Some(outcome) => format!("{}: {outcome} ({} polls)", record.goal, record.polls),
        None => format!("{}: skipped", record.goal),
    }
}
