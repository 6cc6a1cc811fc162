//! Configuration management for `qatrack`.
//!
//! Configuration is layered, later layers winning:
//! - built-in defaults
//! - workspace config (`.qatrack/config.yaml`)
//! - environment variables (`QATRACK_ACTOR`, `QATRACK_MAX_PAGE_SIZE`)
//! - command-line flags ([`CliOverrides`])

use std::fs;
use std::path::{Path, PathBuf};

use qatrack_core::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the workspace directory.
pub const WORKSPACE_DIR: &str = ".qatrack";
/// Config file inside the workspace directory.
pub const CONFIG_FILE: &str = "config.yaml";
/// Database file inside the workspace directory.
pub const DB_FILE: &str = "qatrack.db";

pub const ENV_ACTOR: &str = "QATRACK_ACTOR";
pub const ENV_MAX_PAGE_SIZE: &str = "QATRACK_MAX_PAGE_SIZE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("No qatrack workspace found (run `qt init`)")]
    NotInitialized,
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project every command operates on.
    pub project: String,
    /// Caller identity when `--as` is not given.
    pub actor: Option<String>,
    pub default_role: Role,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Description wrap width for exports; 0 disables wrapping.
    pub wrap_width: usize,
    /// SQLite busy timeout.
    pub lock_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: "default".to_string(),
            actor: None,
            default_role: Role::Admin,
            default_page_size: 20,
            max_page_size: 100,
            wrap_width: 80,
            lock_timeout_ms: 5000,
        }
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub project: Option<String>,
    pub actor: Option<String>,
    pub role: Option<Role>,
}

impl Config {
    /// Load `config.yaml` from `workspace`, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(workspace: &Path) -> Result<Self, ConfigError> {
        let path = workspace.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if a numeric variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(actor) = lookup(ENV_ACTOR).filter(|a| !a.trim().is_empty()) {
            self.actor = Some(actor.trim().to_string());
        }
        if let Some(raw) = lookup(ENV_MAX_PAGE_SIZE) {
            self.max_page_size = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_MAX_PAGE_SIZE.to_string(),
                reason: format!("'{raw}' is not a positive integer"),
            })?;
            if self.max_page_size > 0 && self.default_page_size > self.max_page_size {
                tracing::debug!(
                    from = self.default_page_size,
                    to = self.max_page_size,
                    "Lowering default page size to the environment maximum"
                );
                self.default_page_size = self.max_page_size;
            }
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(project) = &overrides.project {
            self.project.clone_from(project);
        }
        if let Some(actor) = &overrides.actor {
            self.actor = Some(actor.clone());
        }
        if let Some(role) = overrides.role {
            self.default_role = role;
        }
    }

    /// # Errors
    ///
    /// Returns `Invalid` naming the first inconsistent key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(invalid("project", "must not be empty"));
        }
        if self.max_page_size == 0 {
            return Err(invalid("max_page_size", "must be at least 1"));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(invalid(
                "default_page_size",
                &format!("must be between 1 and max_page_size ({})", self.max_page_size),
            ));
        }
        Ok(())
    }

    /// The acting user: configured actor, then `$USER`, then `unknown`.
    #[must_use]
    pub fn actor_or_default(&self) -> String {
        self.actor
            .clone()
            .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Commented template written by `qt init`.
    #[must_use]
    pub fn template(project: &str) -> String {
        let defaults = Self::default();
        format!(
            "# qatrack workspace configuration\n\
             project: {project}\n\
             # actor: alice\n\
             default_role: {}\n\
             default_page_size: {}\n\
             max_page_size: {}\n\
             wrap_width: {}\n\
             lock_timeout_ms: {}\n",
            defaults.default_role,
            defaults.default_page_size,
            defaults.max_page_size,
            defaults.wrap_width,
            defaults.lock_timeout_ms,
        )
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Find the workspace directory.
///
/// An explicit directory wins; otherwise walk up from `start` to the nearest
/// directory containing `.qatrack/`.
///
/// # Errors
///
/// Returns `NotInitialized` if no workspace is found.
pub fn discover_workspace(explicit: Option<&Path>, start: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = explicit {
        if dir.is_dir() {
            return Ok(normalize(dir));
        }
        return Err(ConfigError::NotInitialized);
    }
    start
        .ancestors()
        .map(|ancestor| ancestor.join(WORKSPACE_DIR))
        .find(|candidate| candidate.is_dir())
        .map(|dir| normalize(&dir))
        .ok_or(ConfigError::NotInitialized)
}

fn normalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
