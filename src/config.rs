//! Config loading and persistence.
//!
//! Layers, lowest precedence first: built-in defaults, user config
//! (`~/.config/gitpulse/config.toml`), repo config
//! (`<repo>/gitpulse.toml`), then `GITPULSE_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between checks during the initial phase.
    pub initial_interval_secs: u64,
    /// Seconds between checks once the initial phase is over.
    pub normal_interval_secs: u64,
    /// How many checks run at the initial cadence.
    pub initial_checks: u64,
    /// Consecutive failed cycles before operations are suspended.
    pub max_retries: u32,
    /// Per-strategy connectivity probe timeout.
    pub probe_timeout_secs: u64,
    /// Wall-clock bound on every external git call.
    pub git_timeout_secs: u64,
    /// Target branch; auto-detected from the current branch when unset.
    pub branch: Option<String>,
    /// Operation log path, relative to the repo root when not absolute.
    pub log_file: PathBuf,
    pub max_log_lines: usize,
    /// Lines retained when the log rotates.
    pub log_rotation_keep: usize,
    /// Persisted version counter path.
    pub version_file: PathBuf,
    /// Directory for per-error record files.
    pub error_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_interval_secs: 60,
            normal_interval_secs: 300,
            initial_checks: 3,
            max_retries: 3,
            probe_timeout_secs: 10,
            git_timeout_secs: 60,
            branch: None,
            log_file: PathBuf::from("git_auto_log.txt"),
            max_log_lines: 2000,
            log_rotation_keep: 1000,
            version_file: PathBuf::from(".git_auto_version"),
            error_dir: PathBuf::from("git_auto_errors"),
        }
    }
}

impl Config {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_secs(self.initial_interval_secs)
    }

    pub fn normal_interval(&self) -> Duration {
        Duration::from_secs(self.normal_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    /// TOML snapshot for error record files.
    pub fn snapshot(&self) -> String {
        toml::to_string(self).unwrap_or_else(|_| "<unserializable config>".to_string())
    }
}

/// Partial config as read from a single file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub initial_interval_secs: Option<u64>,
    pub normal_interval_secs: Option<u64>,
    pub initial_checks: Option<u64>,
    pub max_retries: Option<u32>,
    pub probe_timeout_secs: Option<u64>,
    pub git_timeout_secs: Option<u64>,
    pub branch: Option<String>,
    pub log_file: Option<PathBuf>,
    pub max_log_lines: Option<usize>,
    pub log_rotation_keep: Option<usize>,
    pub version_file: Option<PathBuf>,
    pub error_dir: Option<PathBuf>,
}

impl ConfigLayer {
    pub fn apply_to(&self, target: &mut Config) {
        if let Some(v) = self.initial_interval_secs {
            target.initial_interval_secs = v;
        }
        if let Some(v) = self.normal_interval_secs {
            target.normal_interval_secs = v;
        }
        if let Some(v) = self.initial_checks {
            target.initial_checks = v;
        }
        if let Some(v) = self.max_retries {
            target.max_retries = v;
        }
        if let Some(v) = self.probe_timeout_secs {
            target.probe_timeout_secs = v;
        }
        if let Some(v) = self.git_timeout_secs {
            target.git_timeout_secs = v;
        }
        if let Some(v) = &self.branch {
            target.branch = Some(v.clone());
        }
        if let Some(v) = &self.log_file {
            target.log_file = v.clone();
        }
        if let Some(v) = self.max_log_lines {
            target.max_log_lines = v;
        }
        if let Some(v) = self.log_rotation_keep {
            target.log_rotation_keep = v;
        }
        if let Some(v) = &self.version_file {
            target.version_file = v.clone();
        }
        if let Some(v) = &self.error_dir {
            target.error_dir = v.clone();
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gitpulse")
        .join("config.toml")
}

pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join("gitpulse.toml")
}

/// Locate the enclosing git working tree, walking up from `start`.
pub fn discover_repo_root(start: &Path) -> Option<PathBuf> {
    let repo = git2::Repository::discover(start).ok()?;
    repo.workdir().map(|path| path.to_path_buf())
}

fn load_layer(path: &Path) -> Result<Option<ConfigLayer>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

pub fn load_user_config() -> Result<Option<ConfigLayer>> {
    load_layer(&config_path())
}

pub fn load_repo_config(repo_root: &Path) -> Result<Option<ConfigLayer>> {
    load_layer(&repo_config_path(repo_root))
}

pub fn merge_layers(user: Option<ConfigLayer>, repo: Option<ConfigLayer>) -> Config {
    let mut config = Config::default();
    if let Some(layer) = user {
        layer.apply_to(&mut config);
    }
    if let Some(layer) = repo {
        layer.apply_to(&mut config);
    }
    config
}

pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(raw) = std::env::var("GITPULSE_BRANCH") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.branch = Some(trimmed.to_string());
        }
    }

    if let Ok(raw) = std::env::var("GITPULSE_LOG_FILE") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.log_file = PathBuf::from(trimmed);
        }
    }

    if let Ok(raw) = std::env::var("GITPULSE_VERSION_FILE") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.version_file = PathBuf::from(trimmed);
        }
    }

    if let Ok(raw) = std::env::var("GITPULSE_ERROR_DIR") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.error_dir = PathBuf::from(trimmed);
        }
    }

    if let Ok(raw) = std::env::var("GITPULSE_MAX_RETRIES") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            match trimmed.parse::<u32>() {
                Ok(value) => config.max_retries = value,
                Err(err) => {
                    tracing::warn!("invalid GITPULSE_MAX_RETRIES, ignoring: {err}");
                }
            }
        }
    }
}

/// Load the effective config for a repository.
pub fn load_for_repo(repo_root: &Path) -> Result<Config> {
    let user = load_user_config()?;
    let repo = load_repo_config(repo_root)?;
    let mut config = merge_layers(user, repo);
    apply_env_overrides(&mut config);
    Ok(config)
}
