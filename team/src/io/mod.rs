//! I/O helpers for team commands.

pub mod config;
pub mod report;
