//! Restart-intent flag persistence.
//!
//! The intent flag is how a supervised process tells the runner what a
//! clean exit means: `true` for "relaunch me" (reload), `false` for "let
//! me stay down" (shutdown). The runner initializes the flag at launch
//! time and the supervised process rewrites it immediately before its own
//! exit, so the two writers never race in practice. No locking is layered
//! on top of the filesystem write.
//!
//! The store sits behind a trait so the flag channel can be swapped for
//! another persistence mechanism without touching the supervisor loop.

use async_trait::async_trait;
use mudhost_common::{ProcessName, RunnerError, RunnerResult};
use tokio::io::AsyncWriteExt;

use crate::{ensure_parent_dir, RunPaths};

/// Persisted per-process restart intent.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Durably persist the flag before returning.
    async fn set_intent(&self, name: ProcessName, relaunch: bool) -> RunnerResult<()>;

    /// Read the flag. An absent record reads as `false` (do not relaunch).
    async fn get_intent(&self, name: ProcessName) -> RunnerResult<bool>;
}

/// Flag store backed by small `<name>.restart` text files.
#[derive(Debug, Clone)]
pub struct FileIntentStore {
    paths: RunPaths,
}

impl FileIntentStore {
    pub fn new(paths: RunPaths) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl IntentStore for FileIntentStore {
    async fn set_intent(&self, name: ProcessName, relaunch: bool) -> RunnerResult<()> {
        let path = self.paths.restart_flag(name);
        ensure_parent_dir(&path).await?;

        let text = if relaunch { "true" } else { "false" };
        let map_err =
            |e: std::io::Error| RunnerError::run_file(path.display().to_string(), e.to_string());

        let mut file = tokio::fs::File::create(&path).await.map_err(map_err)?;
        file.write_all(text.as_bytes()).await.map_err(map_err)?;
        file.sync_all().await.map_err(map_err)?;

        tracing::debug!("Set restart intent for {} to {}", name, relaunch);
        Ok(())
    }

    async fn get_intent(&self, name: ProcessName) -> RunnerResult<bool> {
        let path = self.paths.restart_flag(name);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(RunnerError::run_file(
                    path.display().to_string(),
                    e.to_string(),
                ))
            }
        };

        // Case-insensitive so records written as "True"/"False" by older
        // tooling still read back correctly. Anything else means false.
        Ok(content.trim().eq_ignore_ascii_case("true"))
    }
}
