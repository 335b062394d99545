//! # Mudhost Common
//!
//! Shared types and utilities for the mudhost game runner.
//!
//! This crate provides the foundational abstractions the runner crates
//! build upon: the runner error type and the managed-process naming
//! domain type.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{RunnerError, RunnerResult};
pub use types::ProcessName;
