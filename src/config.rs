//! Configuration for filekeeper
//!
//! Loads user configuration from `~/.config/filekeeper/config.toml`.
//! Supports protected_paths for refusing deletion of specified directories.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// User settings for filekeeper
///
/// Example config.toml:
/// ```toml
/// # Directory used when a tool call omits `directory`
/// default_directory = "~/Desktop"
///
/// # Files above this size are reported by find_large_files by default
/// large_file_threshold_mb = 100
///
/// # Trash root (contains files/ and info/). Defaults to the platform trash.
/// # trash_dir = "~/.local/share/Trash"
///
/// # Where safe_delete(backup=true) copies targets before trashing them
/// backup_dir = "~/.file_backup"
///
/// # Never delete these paths, nor any directory that contains them
/// protected_paths = ["~/Documents", "/srv/data"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_directory")]
    pub default_directory: String,

    #[serde(default = "default_large_file_threshold_mb")]
    pub large_file_threshold_mb: f64,

    /// Overrides the platform trash location
    #[serde(default)]
    pub trash_dir: Option<String>,

    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    #[serde(default)]
    pub protected_paths: Vec<String>,

    /// Pre-resolved protected paths (canonicalized at load time)
    #[serde(skip)]
    protected_paths_resolved: Vec<PathBuf>,
}

fn default_directory() -> String {
    "~/Desktop".to_string()
}

fn default_large_file_threshold_mb() -> f64 {
    100.0
}

fn default_backup_dir() -> String {
    "~/.file_backup".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_directory: default_directory(),
            large_file_threshold_mb: default_large_file_threshold_mb(),
            trash_dir: None,
            backup_dir: default_backup_dir(),
            protected_paths: Vec::new(),
            protected_paths_resolved: Vec::new(),
        }
    }
}

impl Config {
    /// Get the config file path: ~/.config/filekeeper/config.toml
    ///
    /// If FILEKEEPER_CONFIG environment variable is set, uses that path instead.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FILEKEEPER_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::home_dir().map(|d| d.join(".config").join("filekeeper").join("config.toml"))
    }

    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(mut config) => {
                    config.resolve_protected_paths();
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "config parse error: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot read config: {}", e);
                Self::default()
            }
        }
    }

    /// Pre-resolve protected paths at load time.
    /// Call again after building a Config by hand.
    pub fn resolve_protected_paths(&mut self) {
        self.protected_paths_resolved = self
            .protected_paths
            .iter()
            .map(|entry| {
                let expanded = expand_tilde(entry);
                std::fs::canonicalize(&expanded).unwrap_or(expanded)
            })
            .collect();
    }

    pub fn protected_paths(&self) -> &[PathBuf] {
        &self.protected_paths_resolved
    }

    /// Directory to inspect when the caller gave none
    pub fn directory_or_default(&self, directory: Option<&str>) -> PathBuf {
        match directory {
            Some(dir) if !dir.trim().is_empty() => expand_tilde(dir),
            _ => expand_tilde(&self.default_directory),
        }
    }

    pub fn trash_dir(&self) -> Option<PathBuf> {
        self.trash_dir.as_deref().map(expand_tilde)
    }

    pub fn backup_dir(&self) -> PathBuf {
        expand_tilde(&self.backup_dir)
    }

    /// Replace the protected path list and resolve it
    pub fn with_protected_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_paths = paths.into_iter().map(Into::into).collect();
        self.resolve_protected_paths();
        self
    }

    pub fn with_trash_dir(mut self, dir: impl Into<String>) -> Self {
        self.trash_dir = Some(dir.into());
        self
    }

    pub fn with_backup_dir(mut self, dir: impl Into<String>) -> Self {
        self.backup_dir = dir.into();
        self
    }
}

/// Expand tilde (~) prefix to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

/// True when deleting `target` would also delete `protected`
pub fn covers(target: &Path, protected: &Path) -> bool {
    protected.starts_with(target)
}
