//! Stable exit codes for team CLI commands.

/// Command succeeded; for `team run`, every step resolved or was skipped,
/// whatever the step outcomes.
pub const OK: i32 = 0;
/// Invalid config or plan wiring, protocol violation, or any other error.
pub const INVALID: i32 = 1;
