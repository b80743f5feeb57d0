//! Goal-delegation team runner.
//!
//! A coordinator ([`coordinator::Team`]) drives an ordered plan of goal-steps
//! while standing agents ([`agent`]) execute delegated goals on their own
//! threads. The coordinator hands a goal to an idle agent, re-polls the step
//! until the agent publishes a terminal outcome, then moves to the next step.
//!
//! - **[`core`]**: Pure, deterministic logic (slot transitions, hand-off
//!   policy, plan invariants). No threads, fully testable in isolation.
//! - **[`io`]**: Config and report files.
//!
//! Orchestration modules ([`step`], [`looping`], [`coordinator`]) combine
//! core logic with agents and wait strategies.

pub mod agent;
pub mod coordinator;
pub mod core;
pub mod data;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod plan;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod wait;
pub mod work;
