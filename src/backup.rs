//! Timestamped copies taken before a deletion

use crate::config::covers;
use crate::error::{KeeperError, Result};
use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Suffix format of backup names: `<name>_<YYYYmmdd_HHMMSS>`
pub const BACKUP_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Copy `target` (file, symlink or tree) into `backup_dir` and return the copy
///
/// A failed copy is cleaned up and reported; the target is never touched.
pub fn back_up(target: &Path, backup_dir: &Path) -> Result<PathBuf> {
    if covers(target, backup_dir) {
        return Err(inside_target(target, backup_dir));
    }
    fs::create_dir_all(backup_dir).map_err(|e| KeeperError::from_io(backup_dir, e))?;
    let backup_dir = backup_dir
        .canonicalize()
        .map_err(|e| KeeperError::from_io(backup_dir, e))?;
    if covers(target, &backup_dir) {
        return Err(inside_target(target, &backup_dir));
    }

    let destination = free_name(target, &backup_dir)?;
    if let Err(e) = copy_entry(target, &destination) {
        let _ = if destination.is_dir() {
            fs::remove_dir_all(&destination)
        } else {
            fs::remove_file(&destination)
        };
        return Err(KeeperError::from_io(target, e));
    }
    Ok(destination)
}

fn inside_target(target: &Path, backup_dir: &Path) -> KeeperError {
    KeeperError::InvalidArgument(format!(
        "backup directory '{}' lies inside '{}'",
        backup_dir.display(),
        target.display()
    ))
}

fn free_name(target: &Path, backup_dir: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| KeeperError::InvalidPath(target.display().to_string()))?
        .to_string_lossy();
    let stamp = Local::now().format(BACKUP_TIME_FORMAT);

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = match attempt {
            0 => backup_dir.join(format!("{}_{}", name, stamp)),
            n => backup_dir.join(format!("{}_{}_{}", name, stamp, n)),
        };
        if candidate.symlink_metadata().is_err() {
            return Ok(candidate);
        }
    }
    Err(KeeperError::AlreadyExists(backup_dir.join(&*name)))
}

fn copy_entry(source: &Path, destination: &Path) -> io::Result<()> {
    let file_type = fs::symlink_metadata(source)?.file_type();
    if file_type.is_symlink() {
        return copy_symlink(source, destination);
    }
    if !file_type.is_dir() {
        return fs::copy(source, destination).map(|_| ());
    }

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let out = destination.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&out)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &out)?;
        } else {
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(source)?, destination)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        (tmp, root)
    }

    #[test]
    fn test_backs_up_file_with_timestamp_suffix() {
        let (_tmp, root) = scratch();
        let file = root.join("report.pdf");
        fs::write(&file, "pdf").unwrap();

        let copy = back_up(&file, &root.join("backups")).unwrap();

        let name = copy.file_name().unwrap().to_string_lossy().to_string();
        let stamp = name.strip_prefix("report.pdf_").unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).is_ok());
        assert_eq!(fs::read_to_string(&copy).unwrap(), "pdf");
        assert!(file.exists());
    }

    #[test]
    fn test_backs_up_tree() {
        let (_tmp, root) = scratch();
        let dir = root.join("project");
        fs::create_dir_all(dir.join("src").join("empty")).unwrap();
        fs::write(dir.join("src").join("main.rs"), "fn main() {}").unwrap();

        let copy = back_up(&dir, &root.join("backups")).unwrap();

        assert_eq!(
            fs::read_to_string(copy.join("src").join("main.rs")).unwrap(),
            "fn main() {}"
        );
        assert!(copy.join("src").join("empty").is_dir());
    }

    #[test]
    fn test_same_second_backups_get_distinct_names() {
        let (_tmp, root) = scratch();
        let file = root.join("a.txt");
        fs::write(&file, "a").unwrap();

        let first = back_up(&file, &root.join("backups")).unwrap();
        let second = back_up(&file, &root.join("backups")).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_is_copied_as_link() {
        let (_tmp, root) = scratch();
        fs::write(root.join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link")).unwrap();

        let copy = back_up(&root.join("link"), &root.join("backups")).unwrap();
        assert_eq!(fs::read_link(copy).unwrap(), root.join("real.txt"));
    }

    #[test]
    fn test_refuses_backup_dir_inside_target() {
        let (_tmp, root) = scratch();
        let dir = root.join("dir");
        fs::create_dir_all(&dir).unwrap();

        let err = back_up(&dir, &dir.join("backups")).unwrap_err();
        assert!(matches!(err, KeeperError::InvalidArgument(_)));
        assert!(!dir.join("backups").exists());
    }
}
