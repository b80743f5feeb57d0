//! Standing worker agents and their synchronized assignment slot.
//!
//! Each agent owns one [`Slot`] behind a mutex and runs its execution loop on a
//! dedicated thread. Access is split by role: the coordinator holds an
//! [`AgentLink`] (assign + status), the agent thread holds the reporting side
//! (read its goal + publish). Neither role can perform the other's writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{error, info, instrument, trace, warn};

use crate::core::slot::Slot;
use crate::core::types::{GoalOutcome, SlotStatus};
use crate::error::ProtocolResult;
use crate::wait::Signal;
use crate::work::WorkRegistry;

struct Shared {
    name: String,
    slot: Mutex<Slot>,
    stop: AtomicBool,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        // Every slot transition is a single statement, so a poisoned guard is still consistent.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Coordinator-side capability for one agent: hand off goals and read status.
#[derive(Clone)]
pub struct AgentLink {
    shared: Arc<Shared>,
}

impl AgentLink {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Hand `goal` to the agent. Fails if the agent already holds a goal.
    pub fn assign(&self, goal: &str) -> ProtocolResult<()> {
        self.shared.slot().try_assign(&self.shared.name, goal)?;
        info!(agent = %self.shared.name, goal, "goal handed off");
        Ok(())
    }

    /// Non-blocking snapshot of the agent's slot.
    pub fn status(&self) -> SlotStatus {
        self.shared.slot().status()
    }
}

impl std::fmt::Debug for AgentLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLink")
            .field("name", &self.shared.name)
            .field("status", &self.status())
            .finish()
    }
}

/// Agent-side capability: see the assigned goal and publish its outcome.
struct Reporter {
    shared: Arc<Shared>,
}

impl Reporter {
    fn current_goal(&self) -> Option<String> {
        self.shared.slot().goal().map(str::to_string)
    }

    fn publish(&self, outcome: GoalOutcome) -> ProtocolResult<String> {
        self.shared.slot().publish(&self.shared.name, outcome)
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }
}

/// Tunables for an agent's execution loop.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Sleep between checks of an idle slot.
    pub idle_interval: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_millis(1000),
        }
    }
}

/// A running agent. Dropping the handle asks the loop to stop without joining.
pub struct AgentHandle {
    link: AgentLink,
    thread: Option<JoinHandle<()>>,
}

impl AgentHandle {
    pub fn name(&self) -> &str {
        self.link.name()
    }

    pub fn link(&self) -> AgentLink {
        self.link.clone()
    }

    pub fn assign(&self, goal: &str) -> ProtocolResult<()> {
        self.link.assign(goal)
    }

    pub fn status(&self) -> SlotStatus {
        self.link.status()
    }

    /// Stop the loop after its current unit of work and join the thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.request_stop();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| anyhow!("agent {} thread panicked", self.link.name())),
            None => Ok(()),
        }
    }

    fn request_stop(&self) {
        self.link.shared.stop.store(true, Ordering::Release);
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        self.request_stop();
    }
}

/// Execution loop state owned by the agent thread.
pub struct Agent {
    reporter: Reporter,
    registry: WorkRegistry,
    options: AgentOptions,
    signal: Option<Arc<Signal>>,
}

impl Agent {
    /// Start a named agent on its own thread.
    ///
    /// `signal`, when given, is notified after every published outcome.
    #[instrument(skip(registry, options, signal))]
    pub fn spawn(
        name: &str,
        registry: WorkRegistry,
        options: AgentOptions,
        signal: Option<Arc<Signal>>,
    ) -> Result<AgentHandle> {
        let shared = Arc::new(Shared {
            name: name.to_string(),
            slot: Mutex::new(Slot::default()),
            stop: AtomicBool::new(false),
        });
        let agent = Agent {
            reporter: Reporter {
                shared: Arc::clone(&shared),
            },
            registry,
            options,
            signal,
        };
        let thread = thread::Builder::new()
            .name(format!("agent-{name}"))
            .spawn(move || agent.run())
            .with_context(|| format!("spawn agent {name}"))?;
        info!(agent = name, "agent started");

        Ok(AgentHandle {
            link: AgentLink { shared },
            thread: Some(thread),
        })
    }

    fn run(mut self) {
        let name = self.reporter.shared.name.clone();
        let mut cycle = 0u64;
        while !self.reporter.stop_requested() {
            cycle += 1;
            let goal = self.reporter.current_goal();
            trace!(agent = %name, cycle, goal = ?goal, "agent cycle");

            match goal {
                Some(goal) => self.execute(&name, &goal),
                None => thread::sleep(self.options.idle_interval),
            }
        }
        info!(agent = %name, cycles = cycle, "agent stopped");
    }

    fn execute(&mut self, name: &str, goal: &str) {
        let outcome = match self.registry.get_mut(goal) {
            Some(body) => body.perform(goal),
            None => {
                warn!(agent = name, goal, "no work registered for goal");
                GoalOutcome::Failed
            }
        };

        match self.reporter.publish(outcome) {
            Ok(done) => info!(agent = name, goal = %done, %outcome, "goal finished"),
            Err(err) => error!(agent = name, goal, err = %err, "failed to publish outcome"),
        }
        if let Some(signal) = &self.signal {
            signal.notify();
        }
    }
}
