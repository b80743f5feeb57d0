//! Deterministic, pure logic shared by the coordinator and its agents.
//!
//! Core modules must be free of threads and I/O. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod budget;
pub mod invariants;
pub mod policy;
pub mod slot;
pub mod types;
