//! Rename and move operations

use crate::config::Config;
use crate::error::{KeeperError, Result};
use crate::path_checker::PathChecker;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Characters refused in a new file name
const FORBIDDEN_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, Serialize)]
pub struct RelocationResult {
    pub success: bool,
    pub source_path: String,
    pub target_path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl RelocationResult {
    fn new(source: &Path, target: &Path) -> Self {
        let kind = match fs::symlink_metadata(target) {
            Ok(m) if m.is_dir() => "directory",
            Ok(m) if m.file_type().is_symlink() => "symlink",
            _ => "file",
        };
        Self {
            success: true,
            source_path: source.display().to_string(),
            target_path: target.display().to_string(),
            kind: kind.to_string(),
        }
    }
}

/// Rename an entry in place: `parent/old` -> `parent/new_name`
///
/// Relative paths resolve against `cwd`; protected entries are refused like
/// deletion targets.
pub fn rename_file(
    cwd: &Path,
    config: &Config,
    old_path: &str,
    new_name: &str,
) -> Result<RelocationResult> {
    validate_name(new_name)?;
    let source = movable_source(cwd, config, old_path)?;
    let parent = source
        .parent()
        .ok_or_else(|| KeeperError::InvalidPath(format!("cannot rename '{}'", source.display())))?;
    let target = parent.join(new_name);

    rename_entry(&source, &target)?;
    tracing::info!(from = %source.display(), to = %target.display(), "renamed");
    Ok(RelocationResult::new(&source, &target))
}

/// Move an entry into `target_directory`, keeping its name
///
/// Only same-filesystem moves are performed; a cross-device move is
/// reported as an I/O error rather than emulated with copy + delete.
pub fn move_file(
    cwd: &Path,
    config: &Config,
    source_path: &str,
    target_directory: &str,
) -> Result<RelocationResult> {
    let source = movable_source(cwd, config, source_path)?;
    let target_dir = PathChecker::to_absolute(cwd, target_directory)?;
    let target_dir = target_dir
        .canonicalize()
        .map_err(|e| KeeperError::from_io(&target_dir, e))?;
    if !target_dir.is_dir() {
        return Err(KeeperError::InvalidArgument(format!(
            "'{}' is not a directory",
            target_dir.display()
        )));
    }
    if target_dir.starts_with(&source) {
        return Err(KeeperError::InvalidArgument(format!(
            "cannot move '{}' into itself",
            source.display()
        )));
    }

    let name = source
        .file_name()
        .ok_or_else(|| KeeperError::InvalidPath(format!("cannot move '{}'", source.display())))?;
    let target = target_dir.join(name);

    rename_entry(&source, &target)?;
    tracing::info!(from = %source.display(), to = %target.display(), "moved");
    Ok(RelocationResult::new(&source, &target))
}

/// Canonical source that may be relocated
fn movable_source(cwd: &Path, config: &Config, raw: &str) -> Result<PathBuf> {
    let source = PathChecker::resolve_existing(cwd, raw)?;
    if let Err(e) = PathChecker::check_not_protected(&source, cwd, config) {
        tracing::warn!(path = %source.display(), "refused to relocate: {}", e);
        return Err(e);
    }
    Ok(source)
}

fn rename_entry(source: &Path, target: &Path) -> Result<()> {
    if target.symlink_metadata().is_ok() {
        return Err(KeeperError::AlreadyExists(target.to_path_buf()));
    }
    rename_no_replace(source, target).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => KeeperError::AlreadyExists(target.to_path_buf()),
        _ => KeeperError::from_io(source, e),
    })
}

/// Rename that fails with `AlreadyExists` instead of replacing `to`
///
/// Atomic on Linux (`renameat2` with `RENAME_NOREPLACE`). Elsewhere, and on
/// filesystems without that flag, it is an existence check followed by
/// `rename`, so an entry created at `to` in between is overwritten.
pub(crate) fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(result) = atomic_rename(from, to) {
        return result;
    }

    if to.symlink_metadata().is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("'{}' already exists", to.display()),
        ));
    }
    fs::rename(from, to)
}

/// None when the atomic form is unavailable here
#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn atomic_rename(from: &Path, to: &Path) -> Option<io::Result<()>> {
    match renameat2_noreplace(from, to) {
        Err(e) if matches!(e.raw_os_error(), Some(libc::EINVAL) | Some(libc::ENOSYS)) => None,
        other => Some(other),
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn atomic_rename(_from: &Path, _to: &Path) -> Option<io::Result<()>> {
    None
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn renameat2_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = |p: &Path| {
        CString::new(p.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    };
    let (from_c, to_c) = (c_path(from)?, c_path(to)?);

    // SAFETY: both pointers come from live CStrings; AT_FDCWD needs no fd
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            from_c.as_ptr(),
            libc::AT_FDCWD,
            to_c.as_ptr(),
            libc::RENAME_NOREPLACE as libc::c_uint,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name == "." || name == ".." {
        return Err(KeeperError::InvalidArgument(format!(
            "'{}' is not a usable file name",
            name
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c) || *c == '\0') {
        return Err(KeeperError::InvalidArgument(format!(
            "file name contains forbidden character {:?}",
            c
        )));
    }
    Ok(())
}
