//! Launch planning.
//!
//! Turns the runner configuration and the `start` subcommand's flags
//! into a concrete plan: which process is disabled, which is monitored,
//! which runs detached, and which is skipped because a pid record says
//! an instance is already running.

use mudhost_common::ProcessName;
use mudhost_runfiles::PidRegistry;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::spec::ManagedProcessSpec;

/// Flags of the `start` subcommand.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Do not start the Server process.
    pub noserver: bool,
    /// Do not start the Portal process.
    pub noportal: bool,
    /// Run the Server with output to the terminal instead of its log
    /// file (still monitored and subject to relaunch).
    pub iserver: bool,
    /// Run the Portal monitored with output to the terminal instead of
    /// as a detached daemon.
    pub iportal: bool,
}

/// Why a process is not being launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Disabled by `--noserver`/`--noportal`.
    Disabled,
    /// A pid record exists; an instance is assumed to be running. The
    /// pid is `None` when the record exists but is unreadable -
    /// presence alone is what counts.
    AlreadyRunning { pid: Option<u32> },
}

/// The resolved launch plan for one runner invocation.
#[derive(Debug, Default)]
pub struct LaunchPlan {
    pub monitored: Vec<ManagedProcessSpec>,
    pub detached: Vec<ManagedProcessSpec>,
    pub skipped: Vec<(ProcessName, SkipReason)>,
}

/// Build the launch plan.
///
/// The Server is monitored whenever enabled. The Portal is monitored
/// only under `--iportal`; otherwise it runs as a detached daemon. A
/// present pid record skips the launch with an informational message -
/// no signal is sent, nothing is overwritten, and no liveness check is
/// made beyond file presence.
pub async fn build_launch_plan(
    config: &RunnerConfig,
    options: StartOptions,
    registry: &PidRegistry,
) -> LaunchPlan {
    let mut plan = LaunchPlan::default();

    // Server
    if options.noserver {
        plan.skipped.push((ProcessName::Server, SkipReason::Disabled));
    } else if let Some(reason) = check_already_running(registry, ProcessName::Server).await {
        plan.skipped.push((ProcessName::Server, reason));
    } else {
        plan.monitored
            .push(config.process_spec(ProcessName::Server, true, options.iserver));
    }

    // Portal
    if options.noportal {
        plan.skipped.push((ProcessName::Portal, SkipReason::Disabled));
    } else if let Some(reason) = check_already_running(registry, ProcessName::Portal).await {
        plan.skipped.push((ProcessName::Portal, reason));
    } else if options.iportal {
        plan.monitored
            .push(config.process_spec(ProcessName::Portal, true, true));
    } else {
        plan.detached
            .push(config.process_spec(ProcessName::Portal, false, false));
    }

    plan
}

async fn check_already_running(
    registry: &PidRegistry,
    name: ProcessName,
) -> Option<SkipReason> {
    match registry.read_pid(name).await {
        Ok(Some(pid)) => {
            info!(
                "{} is already running as process {}. Not restarted.",
                name.display_name(),
                pid
            );
            Some(SkipReason::AlreadyRunning { pid: Some(pid) })
        }
        Ok(None) => None,
        Err(e) => {
            // An unreadable record still counts as presence.
            warn!(
                "{} pid record is unreadable ({}); assuming it is already running",
                name.display_name(),
                e
            );
            Some(SkipReason::AlreadyRunning { pid: None })
        }
    }
}
