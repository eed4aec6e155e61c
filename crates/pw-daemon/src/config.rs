//! Daemon configuration from `.pw/daemon.toml`.
//!
//! Every key is optional; a missing file means all defaults. Command-line
//! flags are applied on top by the binary.
//!
//! ```toml
//! port = 3000
//! auth_token = "s3cret"
//!
//! [git]
//! timeout_ms = 30000
//! auto_stage = "require"   # require | proceed | off
//!
//! [checkers]
//! timeout_ms = 10000
//! syntax_url = "http://lint.internal/check"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pw_events::SyncChannelConfig;
use pw_git::GitConfig;

use crate::error::ConfigError;

/// Directory (relative to the workspace) holding daemon state.
pub const DEFAULT_DATA_DIR: &str = ".pw";
pub const CONFIG_FILE: &str = "daemon.toml";
pub const CHANGE_LOG_FILE: &str = "changes.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Workspace all file and git operations are confined to.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// State directory; relative paths are resolved against the workspace.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Per-subscriber push queue capacity.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// When set, every `/api` request must carry `Authorization: Bearer <token>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub checkers: CheckerConfig,
}

/// Where the three verification checks run. Unset URLs use the built-in
/// checkers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckerConfig {
    #[serde(default = "default_checker_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_case_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regression_url: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_checker_timeout_ms() -> u64 {
    10_000
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_checker_timeout_ms(),
            syntax_url: None,
            edge_case_url: None,
            regression_url: None,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            workspace_root: default_workspace_root(),
            data_dir: default_data_dir(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            subscriber_buffer: default_subscriber_buffer(),
            auth_token: None,
            git: GitConfig::default(),
            checkers: CheckerConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `<workspace>/.pw/daemon.toml` if present, otherwise defaults.
    /// The workspace root is always the given directory.
    pub fn load_for_workspace(workspace: &Path) -> Result<Self, ConfigError> {
        let path = workspace.join(DEFAULT_DATA_DIR).join(CONFIG_FILE);
        let mut config = if path.exists() {
            tracing::info!(path = %path.display(), "loading daemon config");
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.workspace_root = workspace.to_path_buf();
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_ms must be greater than zero".into(),
            ));
        }
        if self.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid(
                "subscriber_buffer must be greater than zero".into(),
            ));
        }
        if matches!(&self.auth_token, Some(t) if t.trim().is_empty()) {
            return Err(ConfigError::Invalid("auth_token cannot be blank".into()));
        }
        Ok(())
    }

    pub fn data_dir_path(&self) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            self.workspace_root.join(&self.data_dir)
        }
    }

    pub fn change_log_path(&self) -> PathBuf {
        self.data_dir_path().join(CHANGE_LOG_FILE)
    }

    pub fn channel_config(&self) -> SyncChannelConfig {
        SyncChannelConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            buffer: self.subscriber_buffer,
        }
    }

    pub fn checker_timeout(&self) -> Duration {
        Duration::from_millis(self.checkers.timeout_ms)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_git::AutoStagePolicy;

    #[test]
    fn defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.socket_addr(), "127.0.0.1:3000");
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.subscriber_buffer, 64);
        assert_eq!(config.git.auto_stage, AutoStagePolicy::Require);
        assert!(config.checkers.syntax_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_nested_tables_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".pw")).unwrap();
        std::fs::write(
            dir.path().join(".pw/daemon.toml"),
            r#"
port = 4100
auth_token = "s3cret"

[git]
auto_stage = "proceed"

[checkers]
syntax_url = "http://lint.local/check"
"#,
        )
        .unwrap();

        let config = DaemonConfig::load_for_workspace(dir.path()).unwrap();
        assert_eq!(config.port, 4100);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.git.auto_stage, AutoStagePolicy::Proceed);
        assert_eq!(config.git.timeout_ms, 30_000);
        assert_eq!(config.checkers.syntax_url.as_deref(), Some("http://lint.local/check"));
        assert_eq!(config.workspace_root, dir.path());
        assert_eq!(
            config.change_log_path(),
            dir.path().join(".pw").join("changes.jsonl")
        );
    }

    #[test]
    fn missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::load_for_workspace(dir.path()).unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = DaemonConfig {
            subscriber_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DaemonConfig {
            auth_token: Some("  ".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
