//! Deletion gatekeeper
//!
//! Validates a deletion request, refuses anything unconfirmed or protected,
//! then either erases the target or relocates it to the trash.

use crate::backup;
use crate::config::Config;
use crate::error::{ErrorKind, KeeperError, Result};
use crate::path_checker::PathChecker;
use crate::stats::format_file_size;
use crate::trash::{self, TrashBackend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How a target is deleted
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeletionMode {
    /// Erase from disk (recursively for directories)
    Permanent,
    /// Move into the platform trash
    Recoverable,
}

impl fmt::Display for DeletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::Recoverable => write!(f, "recoverable"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeletionRequest {
    pub target_path: String,
    pub mode: DeletionMode,
    pub confirmed: bool,
    /// Copy the target into the backup directory first
    pub backup: bool,
}

impl DeletionRequest {
    pub fn new(target_path: impl Into<String>, mode: DeletionMode, confirmed: bool) -> Self {
        Self {
            target_path: target_path.into(),
            mode,
            confirmed,
            backup: false,
        }
    }

    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }
}

/// Kind of filesystem entry acted upon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

/// What a successful deletion did
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionOutcome {
    pub resolved_path: PathBuf,
    pub mode: DeletionMode,
    pub entry_type: EntryType,
    /// Where the target now lives (recoverable mode only)
    pub trash_path: Option<PathBuf>,
    /// Entries erased (permanent mode only)
    pub removed: Vec<PathBuf>,
    /// Bytes in the non-directory entries of the target
    pub original_size: u64,
    /// Non-directory entries in the target (1 for a file or symlink)
    pub item_count: u64,
    /// Bytes actually erased; 0 in recoverable mode
    pub space_freed: u64,
    pub backup_path: Option<PathBuf>,
}

/// Structured report returned to tool callers; never an uncaught fault
#[derive(Debug, Clone, Serialize)]
pub struct DeletionResult {
    pub success: bool,
    pub resolved_path: String,
    pub requested_mode: DeletionMode,
    /// Mode actually applied; absent when nothing was done
    pub mode: Option<DeletionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash_path: Option<String>,
    pub removed_entries: Vec<String>,
    pub remaining_entries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<u64>,
    /// Human readable, permanent mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_freed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

impl DeletionResult {
    pub fn from_outcome(request: &DeletionRequest, outcome: Result<DeletionOutcome>) -> Self {
        match outcome {
            Ok(done) => Self {
                success: true,
                resolved_path: done.resolved_path.display().to_string(),
                requested_mode: request.mode,
                mode: Some(done.mode),
                entry_type: Some(done.entry_type),
                error_kind: None,
                message: None,
                trash_path: done.trash_path.map(|p| p.display().to_string()),
                removed_entries: to_strings(&done.removed),
                remaining_entries: Vec::new(),
                original_size: Some(done.original_size),
                item_count: Some(done.item_count),
                space_freed: (done.mode == DeletionMode::Permanent)
                    .then(|| format_file_size(done.space_freed)),
                backup_path: done.backup_path.map(|p| p.display().to_string()),
            },
            Err(err) => {
                let (removed, remaining) = match &err {
                    KeeperError::PartialFailure {
                        removed, remaining, ..
                    } => (to_strings(removed), to_strings(remaining)),
                    _ => (Vec::new(), Vec::new()),
                };
                Self {
                    success: false,
                    resolved_path: err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| request.target_path.clone()),
                    requested_mode: request.mode,
                    // Partial removal did apply the permanent mode
                    mode: matches!(err, KeeperError::PartialFailure { .. })
                        .then_some(DeletionMode::Permanent),
                    entry_type: None,
                    error_kind: Some(err.kind()),
                    message: Some(err.user_message()),
                    trash_path: None,
                    removed_entries: removed,
                    remaining_entries: remaining,
                    original_size: None,
                    item_count: None,
                    space_freed: None,
                    backup_path: None,
                }
            }
        }
    }
}

fn to_strings(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

/// Deletion gatekeeper. Holds no per-call state.
pub struct Gatekeeper {
    config: Config,
    trash: Box<dyn TrashBackend>,
}

impl Gatekeeper {
    pub fn new(config: Config) -> Self {
        let trash = trash::detect(&config);
        Self::with_trash(config, trash)
    }

    pub fn with_trash(config: Config, trash: Box<dyn TrashBackend>) -> Self {
        Self { config, trash }
    }

    pub fn trash_backend(&self) -> &dyn TrashBackend {
        self.trash.as_ref()
    }

    /// Run a request and fold the outcome into a DeletionResult
    pub fn execute(&self, request: &DeletionRequest) -> DeletionResult {
        DeletionResult::from_outcome(request, self.delete(request))
    }

    /// Validate and perform a deletion
    pub fn delete(&self, request: &DeletionRequest) -> Result<DeletionOutcome> {
        let cwd = PathChecker::working_dir()?;
        self.delete_from(&cwd, request)
    }

    /// Same as `delete`, with relative paths and cwd protection taken from `cwd`
    pub fn delete_from(&self, cwd: &Path, request: &DeletionRequest) -> Result<DeletionOutcome> {
        let target = PathChecker::resolve_existing(cwd, &request.target_path)?;

        if let Err(e) = PathChecker::check_not_protected(&target, cwd, &self.config) {
            tracing::warn!(path = %target.display(), mode = %request.mode, "refused: {}", e);
            return Err(e);
        }

        if !request.confirmed {
            tracing::warn!(path = %target.display(), mode = %request.mode, "refused: not confirmed");
            return Err(KeeperError::ConfirmationRequired { path: target });
        }

        let entry_type = entry_type(&target)?;

        let backup_path = if request.backup {
            let copy = backup::back_up(&target, &self.config.backup_dir())?;
            tracing::info!(path = %target.display(), backup = %copy.display(), "backed up");
            Some(copy)
        } else {
            None
        };

        let outcome = match request.mode {
            DeletionMode::Permanent => {
                let removal = remove_permanently(&target, entry_type)?;
                DeletionOutcome {
                    resolved_path: target,
                    mode: DeletionMode::Permanent,
                    entry_type,
                    trash_path: None,
                    removed: removal.removed,
                    original_size: removal.original_size,
                    item_count: removal.item_count,
                    space_freed: removal.freed,
                    backup_path,
                }
            }
            DeletionMode::Recoverable => {
                let (original_size, item_count) = measure(&target);
                let trash_path = self.trash.move_to_trash(&target)?;
                DeletionOutcome {
                    resolved_path: target,
                    mode: DeletionMode::Recoverable,
                    entry_type,
                    trash_path: Some(trash_path),
                    removed: Vec::new(),
                    original_size,
                    item_count,
                    space_freed: 0,
                    backup_path,
                }
            }
        };

        tracing::info!(
            path = %outcome.resolved_path.display(),
            mode = %outcome.mode,
            entries = outcome.removed.len(),
            freed = outcome.space_freed,
            "deleted"
        );
        Ok(outcome)
    }
}

fn entry_type(path: &Path) -> Result<EntryType> {
    let meta = fs::symlink_metadata(path).map_err(|e| KeeperError::from_io(path, e))?;
    let ft = meta.file_type();
    Ok(if ft.is_symlink() {
        EntryType::Symlink
    } else if ft.is_dir() {
        EntryType::Directory
    } else {
        EntryType::File
    })
}

/// What a permanent removal erased
#[derive(Debug, Default)]
struct Removal {
    removed: Vec<PathBuf>,
    original_size: u64,
    item_count: u64,
    freed: u64,
}

/// Erase `target`, bottom-up for directories
fn remove_permanently(target: &Path, entry_type: EntryType) -> Result<Removal> {
    if entry_type == EntryType::Directory {
        return remove_tree_with(target, |path, is_dir| {
            if is_dir {
                fs::remove_dir(path)
            } else {
                fs::remove_file(path)
            }
        });
    }

    let size = fs::symlink_metadata(target).map(|m| m.len()).unwrap_or(0);
    fs::remove_file(target).map_err(|e| KeeperError::from_io(target, e))?;
    Ok(Removal {
        removed: vec![target.to_path_buf()],
        original_size: size,
        item_count: 1,
        freed: size,
    })
}

/// Walk `target` contents-first and hand every entry to `remove`
///
/// Every entry is attempted even after a failure so the caller gets the
/// complete removed/remaining split.
fn remove_tree_with<F>(target: &Path, mut remove: F) -> Result<Removal>
where
    F: FnMut(&Path, bool) -> io::Result<()>,
{
    let mut removal = Removal::default();
    let mut remaining = Vec::new();
    let mut first_error: Option<(PathBuf, io::Error)> = None;

    for entry in WalkDir::new(target).contents_first(true).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // Unreadable directory: its contents stay, and so does it
                let path = e.path().unwrap_or(target).to_path_buf();
                tracing::debug!(path = %path.display(), "cannot read: {}", e);
                let io_err = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop"));
                if !remaining.contains(&path) {
                    remaining.push(path.clone());
                }
                first_error.get_or_insert((path, io_err));
                continue;
            }
        };

        let path = entry.path();
        let is_dir = entry.file_type().is_dir();
        let size = if is_dir {
            0
        } else {
            removal.item_count += 1;
            entry.metadata().map(|m| m.len()).unwrap_or(0)
        };
        removal.original_size += size;

        match remove(path, is_dir) {
            Ok(()) => {
                removal.removed.push(path.to_path_buf());
                removal.freed += size;
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), "cannot remove: {}", e);
                if !remaining.iter().any(|p| p == path) {
                    remaining.push(path.to_path_buf());
                }
                first_error.get_or_insert((path.to_path_buf(), e));
            }
        }
    }

    let Some((failed_path, err)) = first_error else {
        return Ok(removal);
    };

    if removal.removed.is_empty() {
        // Nothing changed on disk: report the underlying cause
        return Err(KeeperError::from_io(&failed_path, err));
    }

    Err(KeeperError::PartialFailure {
        path: target.to_path_buf(),
        removed: removal.removed,
        remaining,
        reason: format!("{}: {}", failed_path.display(), err),
    })
}

/// Total bytes and count of non-directory entries under `target`
fn measure(target: &Path) -> (u64, u64) {
    WalkDir::new(target)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .fold((0, 0), |(size, count), entry| {
            let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
            (size + len, count + 1)
        })
}
