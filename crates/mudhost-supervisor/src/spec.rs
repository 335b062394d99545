//! Immutable launch descriptors for managed processes.

use mudhost_common::ProcessName;
use std::path::PathBuf;

/// Where a managed process's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Append stdout/stderr to the process's active log file.
    LogFile,
    /// Inherit the controlling terminal (interactive mode).
    Terminal,
}

/// Immutable descriptor for one managed process.
///
/// Created once at startup from configuration and CLI flags, then only
/// ever cloned - a relaunch reuses the exact same descriptor.
#[derive(Debug, Clone)]
pub struct ManagedProcessSpec {
    pub name: ProcessName,
    /// Executable to launch.
    pub executable: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory for the child, if different from the runner's.
    pub working_directory: Option<PathBuf>,
    /// Active log file; rotated to `.old` once per runner invocation.
    pub log_file: PathBuf,
    pub output: OutputTarget,
    /// Monitored processes are awaited and may be relaunched; detached
    /// ones are fire-and-forget daemons the supervisor never observes
    /// again.
    pub monitored: bool,
}

impl ManagedProcessSpec {
    /// The command line for diagnostics.
    pub fn command_line(&self) -> String {
        let mut line = self.executable.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}
