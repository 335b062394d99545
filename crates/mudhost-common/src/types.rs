//! Core domain types for the mudhost game runner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a managed process.
///
/// The runner manages exactly two long-lived services: the Server, which
/// holds game logic and is expected to be stopped and relaunched often,
/// and the Portal, which terminates client connections and normally runs
/// as a detached daemon. All persisted run-file names (`server.pid`,
/// `portal.restart`, ...) derive from this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessName {
    /// The game-logic process, relaunched on reload.
    Server,
    /// The connection-terminating process, normally a daemon.
    Portal,
}

impl ProcessName {
    /// Both managed process names, in launch order.
    pub const ALL: [ProcessName; 2] = [ProcessName::Server, ProcessName::Portal];

    /// Returns the process name as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessName::Server => "server",
            ProcessName::Portal => "portal",
        }
    }

    /// Human-readable display name for log messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProcessName::Server => "Server",
            ProcessName::Portal => "Portal",
        }
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_name_strings() {
        assert_eq!(ProcessName::Server.as_str(), "server");
        assert_eq!(ProcessName::Portal.as_str(), "portal");
        assert_eq!(ProcessName::Server.to_string(), "server");
        assert_eq!(ProcessName::Portal.display_name(), "Portal");
    }

    #[test]
    fn test_process_name_serde() {
        let json = serde_json::to_string(&ProcessName::Server).unwrap();
        assert_eq!(json, "\"server\"");
        let name: ProcessName = serde_json::from_str("\"portal\"").unwrap();
        assert_eq!(name, ProcessName::Portal);
    }
}
