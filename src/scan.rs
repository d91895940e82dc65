//! Directory traversal shared by the inspection tools

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which files of a directory an operation looks at
#[derive(Debug, Clone)]
pub struct Scope {
    pub directory: PathBuf,
    /// Extension filter without the leading dot, compared case-insensitively
    pub extension: Option<String>,
    pub recursive: bool,
}

impl Scope {
    pub fn new(directory: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            directory: directory.into(),
            extension: None,
            recursive,
        }
    }

    pub fn with_extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty());
        self
    }

    fn walker(&self) -> WalkDir {
        let walker = WalkDir::new(&self.directory).min_depth(1).sort_by_file_name();
        if self.recursive {
            walker
        } else {
            walker.max_depth(1)
        }
    }

    fn matches_extension(&self, path: &Path) -> bool {
        match &self.extension {
            None => true,
            Some(want) => path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase() == *want)
                .unwrap_or(false),
        }
    }

    /// Regular files in scope, with their metadata
    ///
    /// A missing directory yields nothing. Entries that cannot be read are
    /// skipped.
    pub fn files(&self) -> impl Iterator<Item = ScannedFile> + '_ {
        self.walker()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.matches_extension(entry.path()))
            .filter_map(|entry| match entry.metadata() {
                Ok(metadata) => Some(ScannedFile {
                    path: entry.into_path(),
                    metadata,
                }),
                Err(e) => {
                    tracing::debug!("skipping entry without metadata: {}", e);
                    None
                }
            })
    }

    /// Directories in scope (the base directory itself excluded)
    pub fn directories(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.walker()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
    }
}

#[derive(Debug)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub metadata: Metadata,
}

impl ScannedFile {
    pub fn size(&self) -> u64 {
        self.metadata.len()
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.metadata.modified().ok()
    }

    pub fn relative_to(&self, base: &Path) -> PathBuf {
        self.path
            .strip_prefix(base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.path.clone())
    }

    pub fn to_entry(&self, base: &Path) -> FileEntry {
        let modified = self.modified().map(DateTime::<Local>::from);
        FileEntry {
            filename: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            full_path: self.path.display().to_string(),
            relative_path: self.relative_to(base).display().to_string(),
            directory: self
                .path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            size_bytes: self.size(),
            size_formatted: crate::stats::format_file_size(self.size()),
            modified_time: modified.map(|t| t.format(DISPLAY_TIME_FORMAT).to_string()),
            modified_timestamp: modified.map(|t| t.timestamp()),
            extension: extension_of(&self.path),
        }
    }
}

/// File description shared by the large/recent/date-range tools
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub full_path: String,
    pub relative_path: String,
    pub directory: String,
    pub size_bytes: u64,
    pub size_formatted: String,
    pub modified_time: Option<String>,
    pub modified_timestamp: Option<i64>,
    /// Lowercased, with the leading dot; empty when the file has none
    pub extension: String,
}

/// `.txt` style extension, lowercased
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
