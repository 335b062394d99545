//! # Mudhost Runfiles
//!
//! Filesystem-persisted run state for the mudhost game runner.
//!
//! This crate provides functionality for:
//! - PID record persistence (advisory "already running" detection)
//! - Restart-intent flag persistence (the reload/shutdown channel)
//! - Log file rotation before launch
//!
//! The pid and restart files are the only state shared between the
//! runner and its supervised processes. They live on disk rather than in
//! memory on purpose: after a reload the Server is a brand-new OS
//! process with no inherited channel back to the runner, and the files
//! also survive the runner itself being restarted independently of its
//! children.

use mudhost_common::{ProcessName, RunnerError, RunnerResult};
use std::path::{Path, PathBuf};

pub mod intent;

pub use intent::{FileIntentStore, IntentStore};

/// Path layout for the per-process run files inside a run directory.
///
/// File names derive from the process name: `server.pid`,
/// `server.restart`, `portal.pid`, `portal.restart`.
#[derive(Debug, Clone)]
pub struct RunPaths {
    base: PathBuf,
}

impl RunPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Path of the PID record for a process.
    pub fn pid_file(&self, name: ProcessName) -> PathBuf {
        self.base.join(format!("{}.pid", name))
    }

    /// Path of the restart-intent flag for a process.
    pub fn restart_flag(&self, name: ProcessName) -> PathBuf {
        self.base.join(format!("{}.restart", name))
    }
}

/// Persisted PID records, used only as an advisory "already running"
/// check at runner startup.
///
/// This is a cooperative mechanism, not a lock: the runner treats the
/// mere presence of a record as "already running" and never probes the
/// recorded pid for liveness. A stale record left behind by a crash
/// suppresses a restart until the operator removes the file.
///
/// Records are not removed on process exit.
#[derive(Debug, Clone)]
pub struct PidRegistry {
    paths: RunPaths,
}

impl PidRegistry {
    pub fn new(paths: RunPaths) -> Self {
        Self { paths }
    }

    /// Persist the pid of a freshly launched process.
    ///
    /// Written immediately after the first successful launch in a runner
    /// invocation; relaunches within the same invocation do not rewrite
    /// the record.
    pub async fn record_pid(&self, name: ProcessName, pid: u32) -> RunnerResult<()> {
        let path = self.paths.pid_file(name);
        ensure_parent_dir(&path).await?;

        let content = format!("{}\n", pid);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| RunnerError::run_file(path.display().to_string(), e.to_string()))?;

        tracing::debug!("Recorded pid {} for {}", pid, name);
        Ok(())
    }

    /// Read the last recorded pid for a process.
    ///
    /// Returns `Ok(None)` if no record exists. A record that exists but
    /// does not parse is an error; callers deciding "already running"
    /// should still treat it as presence.
    pub async fn read_pid(&self, name: ProcessName) -> RunnerResult<Option<u32>> {
        let path = self.paths.pid_file(name);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RunnerError::run_file(
                    path.display().to_string(),
                    e.to_string(),
                ))
            }
        };

        let pid = content.trim().parse::<u32>().map_err(|e| {
            RunnerError::run_file(
                path.display().to_string(),
                format!("invalid pid record: {}", e),
            )
        })?;

        Ok(Some(pid))
    }
}

/// Rotate a log file aside before a process is first launched.
///
/// If `path` exists, any existing `path.old` is deleted and `path` is
/// renamed to `path.old`. A missing `path` is a no-op. Called once per
/// process per runner invocation; relaunches within the same invocation
/// keep appending to the active file.
pub async fn rotate_log(path: &Path) -> RunnerResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(RunnerError::run_file(
                path.display().to_string(),
                e.to_string(),
            ))
        }
    }

    let old = old_log_path(path);
    if tokio::fs::metadata(&old).await.is_ok() {
        tokio::fs::remove_file(&old)
            .await
            .map_err(|e| RunnerError::run_file(old.display().to_string(), e.to_string()))?;
    }

    tokio::fs::rename(path, &old)
        .await
        .map_err(|e| RunnerError::run_file(path.display().to_string(), e.to_string()))?;

    tracing::debug!("Rotated log {} to {}", path.display(), old.display());
    Ok(())
}

fn old_log_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".old");
    PathBuf::from(os)
}

pub(crate) async fn ensure_parent_dir(path: &Path) -> RunnerResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RunnerError::run_file(parent.display().to_string(), e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_paths_layout() {
        let paths = RunPaths::new("/srv/game");
        assert_eq!(
            paths.pid_file(ProcessName::Server),
            PathBuf::from("/srv/game/server.pid")
        );
        assert_eq!(
            paths.restart_flag(ProcessName::Portal),
            PathBuf::from("/srv/game/portal.restart")
        );
    }

    #[tokio::test]
    async fn test_pid_record_round_trip() {
        let dir = tempdir().unwrap();
        let registry = PidRegistry::new(RunPaths::new(dir.path()));

        registry
            .record_pid(ProcessName::Server, 4242)
            .await
            .unwrap();
        let pid = registry.read_pid(ProcessName::Server).await.unwrap();
        assert_eq!(pid, Some(4242));

        // Raw text format, trailing newline
        let raw = std::fs::read_to_string(dir.path().join("server.pid")).unwrap();
        assert_eq!(raw, "4242\n");
    }

    #[tokio::test]
    async fn test_absent_pid_record_reads_as_none() {
        let dir = tempdir().unwrap();
        let registry = PidRegistry::new(RunPaths::new(dir.path()));
        assert_eq!(registry.read_pid(ProcessName::Portal).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbled_pid_record_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("server.pid"), "not-a-pid\n").unwrap();

        let registry = PidRegistry::new(RunPaths::new(dir.path()));
        let result = registry.read_pid(ProcessName::Server).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rotate_replaces_old_file() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("server.log");
        let old = dir.path().join("server.log.old");
        std::fs::write(&log, "current run").unwrap();
        std::fs::write(&old, "previous run").unwrap();

        rotate_log(&log).await.unwrap();

        assert!(!log.exists());
        assert_eq!(std::fs::read_to_string(&old).unwrap(), "current run");
    }

    #[tokio::test]
    async fn test_rotate_missing_file_is_noop() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("portal.log");

        rotate_log(&log).await.unwrap();

        assert!(!log.exists());
        assert!(!dir.path().join("portal.log.old").exists());
    }
}
