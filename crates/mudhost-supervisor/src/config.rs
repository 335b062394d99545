//! Runner configuration.
//!
//! Configuration is loaded from a small YAML file when one is given and
//! falls back to built-in defaults otherwise. Every field has a serde
//! default so partial files stay valid.

use anyhow::{Context, Result};
use mudhost_common::ProcessName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::spec::{ManagedProcessSpec, OutputTarget};

/// Top-level runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory holding pid records, restart flags and log files.
    /// Relative log file paths resolve against it.
    #[serde(default = "default_run_directory")]
    pub run_directory: PathBuf,

    #[serde(default = "ProcessSettings::server_defaults")]
    pub server: ProcessSettings,

    #[serde(default = "ProcessSettings::portal_defaults")]
    pub portal: ProcessSettings,
}

/// Launch settings for one managed process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSettings {
    pub executable_path: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Active log file, rotated to `.old` at launch.
    pub log_file: PathBuf,
}

impl ProcessSettings {
    fn server_defaults() -> Self {
        Self {
            executable_path: "mudhost-server".to_string(),
            args: Vec::new(),
            working_directory: None,
            log_file: PathBuf::from("server.log"),
        }
    }

    fn portal_defaults() -> Self {
        Self {
            executable_path: "mudhost-portal".to_string(),
            args: Vec::new(),
            working_directory: None,
            log_file: PathBuf::from("portal.log"),
        }
    }
}

fn default_run_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            run_directory: default_run_directory(),
            server: ProcessSettings::server_defaults(),
            portal: ProcessSettings::portal_defaults(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: RunnerConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        for name in ProcessName::ALL {
            let settings = self.settings(name);
            if settings.executable_path.trim().is_empty() {
                anyhow::bail!("{}: executable_path must not be empty", name);
            }
            if settings.log_file.as_os_str().is_empty() {
                anyhow::bail!("{}: log_file must not be empty", name);
            }
        }
        Ok(())
    }

    /// Launch settings for a process name.
    pub fn settings(&self, name: ProcessName) -> &ProcessSettings {
        match name {
            ProcessName::Server => &self.server,
            ProcessName::Portal => &self.portal,
        }
    }

    /// Resolve a process's log file against the run directory.
    pub fn log_file(&self, name: ProcessName) -> PathBuf {
        let log_file = &self.settings(name).log_file;
        if log_file.is_absolute() {
            log_file.clone()
        } else {
            self.run_directory.join(log_file)
        }
    }

    /// Build the immutable launch descriptor for a process.
    pub fn process_spec(
        &self,
        name: ProcessName,
        monitored: bool,
        interactive: bool,
    ) -> ManagedProcessSpec {
        let settings = self.settings(name);
        ManagedProcessSpec {
            name,
            executable: settings.executable_path.clone(),
            args: settings.args.clone(),
            working_directory: settings.working_directory.clone(),
            log_file: self.log_file(name),
            output: if interactive {
                OutputTarget::Terminal
            } else {
                OutputTarget::LogFile
            },
            monitored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.executable_path, "mudhost-server");
        assert_eq!(config.portal.log_file, PathBuf::from("portal.log"));
    }

    #[test]
    fn test_log_file_resolution() {
        let mut config = RunnerConfig::default();
        config.run_directory = PathBuf::from("/srv/game");

        assert_eq!(
            config.log_file(ProcessName::Server),
            PathBuf::from("/srv/game/server.log")
        );

        config.portal.log_file = PathBuf::from("/var/log/portal.log");
        assert_eq!(
            config.log_file(ProcessName::Portal),
            PathBuf::from("/var/log/portal.log")
        );
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  executable_path: ./server.sh\n  args: [\"--reload\"]\n  log_file: logs/server.log\n"
        )
        .unwrap();

        let config = RunnerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.server.executable_path, "./server.sh");
        assert_eq!(config.server.args, vec!["--reload".to_string()]);
        // Unspecified sections fall back to defaults
        assert_eq!(config.portal.executable_path, "mudhost-portal");
        assert_eq!(config.run_directory, PathBuf::from("."));
    }

    #[test]
    fn test_empty_executable_fails_validation() {
        let mut config = RunnerConfig::default();
        config.server.executable_path = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spec_building() {
        let config = RunnerConfig::default();

        let spec = config.process_spec(ProcessName::Portal, false, false);
        assert!(!spec.monitored);
        assert_eq!(spec.output, OutputTarget::LogFile);

        let spec = config.process_spec(ProcessName::Server, true, true);
        assert!(spec.monitored);
        assert_eq!(spec.output, OutputTarget::Terminal);
    }
}
