//! # Mudhost Supervisor
//!
//! Launch and restart supervision for the Server and Portal processes.
//!
//! This crate provides:
//! - Runner configuration (YAML, with built-in defaults)
//! - Immutable launch descriptors for the two managed processes
//! - Launch planning from CLI options (disabled / monitored / detached)
//! - The supervisor loop that relaunches cleanly exiting processes when
//!   their persisted restart intent says so
//!
//! The design splits a clean "reload" exit from a clean "shutdown" exit
//! using the restart-intent flag from `mudhost-runfiles`: the supervised
//! process rewrites its flag before exiting zero, and the supervisor
//! reads it exactly once per completion event. A non-zero exit always
//! stops the process for good, whatever the flag says.

pub mod config;
pub(crate) mod launcher;
pub mod plan;
pub mod spec;
pub mod supervisor;

pub use config::{ProcessSettings, RunnerConfig};
pub use plan::{build_launch_plan, LaunchPlan, SkipReason, StartOptions};
pub use spec::{ManagedProcessSpec, OutputTarget};
pub use supervisor::{
    CancelHandle, CompletionEvent, ProcessOutcome, Supervisor, SupervisorReport,
    SYNTHETIC_FAILURE_CODE,
};
