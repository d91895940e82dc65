//! Configuration initialization for filekeeper
//!
//! Generates a default config file at ~/.config/filekeeper/config.toml

use crate::config::Config;
use anyhow::{bail, Context};
use std::fs;
use std::path::Path;

/// Default config template
const CONFIG_TEMPLATE: &str = r#"# filekeeper configuration
# Location: ~/.config/filekeeper/config.toml (override with FILEKEEPER_CONFIG)

# Directory inspected when a tool call omits `directory`
default_directory = "~/Desktop"

# Default threshold for find_large_files, in MB
large_file_threshold_mb = 100

# Trash root holding files/ and info/ (default: ~/.local/share/Trash on Linux,
# ~/.Trash on macOS)
# trash_dir = "~/.local/share/Trash"

# Where `safe_delete` with backup=true (or `filekeeper delete --backup`)
# copies a target before it is removed
backup_dir = "~/.file_backup"

# Paths that must never be deleted, together with every directory containing
# them. The filesystem root, top-level system directories, the home directory
# and the server's working directory are always protected.
protected_paths = [
    # "~/Documents",
]
"#;

/// Run the init subcommand
pub fn run_init() -> anyhow::Result<()> {
    let Some(config_path) = Config::config_path() else {
        bail!("Cannot determine config directory");
    };
    if write_template(&config_path)? {
        println!("Created config file: {}", config_path.display());
        println!();
        println!("Edit the file to add protected paths or change the default directory.");
    } else {
        eprintln!("Config file already exists: {}", config_path.display());
        eprintln!("To regenerate, delete the file first and run `filekeeper init` again.");
    }
    Ok(())
}

/// Write the template unless a file is already there; true when written
fn write_template(config_path: &Path) -> anyhow::Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }
    if let Some(config_dir) = config_path.parent() {
        fs::create_dir_all(config_dir)
            .with_context(|| format!("Cannot create directory {}", config_dir.display()))?;
    }
    fs::write(config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Cannot write config file {}", config_path.display()))?;
    Ok(true)
}

/// Get the config path for display purposes
pub fn config_path_display() -> String {
    Config::config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/filekeeper/config.toml".to_string())
}
