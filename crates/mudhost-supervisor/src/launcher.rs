//! Low-level process launching.
//!
//! Builds the `tokio::process::Command` for a launch descriptor and
//! spawns it. Failure to spawn is returned to the caller; the supervisor
//! converts it into a synthetic completion event rather than letting it
//! cross task boundaries as an error.

use mudhost_common::{RunnerError, RunnerResult};
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::spec::{ManagedProcessSpec, OutputTarget};

/// Spawn the OS process for a launch descriptor.
pub(crate) fn spawn_child(spec: &ManagedProcessSpec) -> RunnerResult<Child> {
    let mut cmd = Command::new(&spec.executable);
    cmd.args(&spec.args).stdin(Stdio::null());

    if let Some(dir) = &spec.working_directory {
        cmd.current_dir(dir);
    }

    match spec.output {
        OutputTarget::Terminal => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        OutputTarget::LogFile => {
            // Append so a relaunch continues the active log; rotation
            // happens once per runner invocation, before first launch.
            let stdout = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&spec.log_file)
                .map_err(|e| {
                    RunnerError::spawn_failed(
                        spec.name,
                        format!("cannot open log file {}: {}", spec.log_file.display(), e),
                    )
                })?;
            let stderr = stdout
                .try_clone()
                .map_err(|e| RunnerError::spawn_failed(spec.name, e.to_string()))?;
            cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
        }
    }

    cmd.spawn()
        .map_err(|e| RunnerError::spawn_failed(spec.name, e.to_string()))
}
