//! Client configuration.
//!
//! Read from `client.toml` (by default under the platform config directory,
//! `patchwire/client.toml`). `PW_API_URL` and `PW_API_TOKEN` override the
//! file so a token never has to be written to disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;

pub const API_URL_ENV: &str = "PW_API_URL";
pub const API_TOKEN_ENV: &str = "PW_API_TOKEN";

/// Everything the client sync agent needs to talk to a daemon and act on
/// a local checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the patchwire daemon.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Pull interval for the periodic sync.
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    /// Apply `change_ready` pushes as soon as they arrive.
    #[serde(default)]
    pub auto_apply: bool,

    /// Local checkout that changes are applied to.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Task document, relative to `workspace_root`.
    #[serde(default = "default_tasks_file")]
    pub tasks_file: PathBuf,

    /// Delay before reconnecting a dropped push channel.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_sync_interval_ms() -> u64 {
    30_000
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_tasks_file() -> PathBuf {
    PathBuf::from("tasks.md")
}

fn default_reconnect_backoff_ms() -> u64 {
    5_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_token: None,
            sync_interval_ms: default_sync_interval_ms(),
            auto_apply: false,
            workspace_root: default_workspace_root(),
            tasks_file: default_tasks_file(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
        }
    }
}

impl ClientConfig {
    /// `<config dir>/patchwire/client.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("patchwire").join("client.toml"))
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))
    }

    /// Load from `path` (or the default location), falling back to defaults
    /// when the file does not exist, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SyncError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(p) if p.exists() => {
                tracing::debug!(path = %p.display(), "loading client config");
                Self::from_file(&p)?
            }
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `PW_API_URL` / `PW_API_TOKEN` from the given lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(token) = lookup(API_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "api_url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        if self.sync_interval_ms == 0 {
            return Err(SyncError::Config(
                "sync_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    /// The task document path, resolved against the workspace root.
    pub fn tasks_path(&self) -> PathBuf {
        self.workspace_root.join(&self.tasks_file)
    }
}
