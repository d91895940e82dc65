//! Path validation for filekeeper
//!
//! Normalizes caller-supplied paths and refuses protected deletion targets.

use crate::config::{covers, expand_tilde, Config};
use crate::error::{KeeperError, Result};
use path_clean::PathClean;
use std::path::{Component, Path, PathBuf};

/// Path validator
pub struct PathChecker;

impl PathChecker {
    /// Resolve a caller path to the canonical entry it names
    ///
    /// * `~` is expanded, relative paths are joined onto `base`
    /// * the parent directory is canonicalized by the OS, so `..` is applied
    ///   after symlinks exactly as the kernel would
    /// * the final component is kept as-is so a symlink names the link, not
    ///   its target; a trailing `.` or `..` resolves the whole path
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - absolute path of an existing entry
    /// * `Err(KeeperError::InvalidPath)` - empty path
    /// * `Err(KeeperError::NotFound)` - nothing exists at that path
    pub fn resolve_existing(base: &Path, raw: &str) -> Result<PathBuf> {
        let absolute = Self::to_absolute(base, raw)?;
        let not_found = || KeeperError::NotFound(absolute.clean());

        let canonical = match (absolute.parent(), absolute.file_name()) {
            (Some(parent), Some(name)) if !ends_in_dot_segment(raw) => parent
                .canonicalize()
                .map_err(|_| not_found())?
                .join(name),
            // "/", "dir/.." and "dir/." name a directory, never a link
            _ => absolute.canonicalize().map_err(|_| not_found())?,
        };

        if std::fs::symlink_metadata(&canonical).is_err() {
            return Err(KeeperError::NotFound(canonical));
        }

        Ok(canonical)
    }

    /// Absolute form of `raw` (existence not checked, `..` left in place)
    pub fn to_absolute(base: &Path, raw: &str) -> Result<PathBuf> {
        if raw.trim().is_empty() {
            return Err(KeeperError::InvalidPath("path must not be empty".into()));
        }
        if raw.contains('\0') {
            return Err(KeeperError::InvalidPath("path contains a NUL byte".into()));
        }

        let expanded = expand_tilde(raw);
        Ok(if expanded.is_absolute() {
            expanded
        } else {
            base.join(expanded)
        })
    }

    /// Process working directory
    pub fn working_dir() -> Result<PathBuf> {
        std::env::current_dir().map_err(|e| KeeperError::Io {
            path: PathBuf::from("."),
            source: e,
        })
    }

    /// Refuse targets whose deletion would take out something vital
    ///
    /// `target` must already be canonical. `cwd` is the host process working
    /// directory.
    pub fn check_not_protected(target: &Path, cwd: &Path, config: &Config) -> Result<()> {
        let refuse = |reason: &str| {
            Err(KeeperError::ProtectedPath {
                path: target.to_path_buf(),
                reason: reason.to_string(),
            })
        };

        if Self::is_root(target) {
            return refuse("filesystem root");
        }
        if Self::is_top_level(target) {
            return refuse("top-level system directory");
        }

        let cwd = Self::try_canonicalize(cwd);
        if covers(target, &cwd) {
            return refuse("current working directory of the host process (or one of its parents)");
        }

        if let Some(home) = dirs::home_dir() {
            let home = Self::try_canonicalize(&home);
            if covers(target, &home) {
                return refuse("home directory (or one of its parents)");
            }
        }

        if let Some(protected) = config
            .protected_paths()
            .iter()
            .find(|protected| covers(target, protected))
        {
            return Err(KeeperError::ProtectedPath {
                path: target.to_path_buf(),
                reason: format!("configured protected path '{}'", protected.display()),
            });
        }

        Ok(())
    }

    fn is_root(path: &Path) -> bool {
        path.parent().is_none()
    }

    /// `/etc`, `/usr`, `C:\Windows`...
    fn is_top_level(path: &Path) -> bool {
        path.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
            == 1
    }

    /// canonicalize when possible, otherwise return the path unchanged
    fn try_canonicalize(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Last segment of `raw` is `.` or `..`
fn ends_in_dot_segment(raw: &str) -> bool {
    let trimmed = raw.trim_end_matches(std::path::is_separator);
    let last = trimmed
        .rsplit(std::path::is_separator)
        .next()
        .unwrap_or(trimmed);
    last == "." || last == ".."
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        // canonicalize to get the real path (handles /private on macOS)
        let root = temp_dir.path().canonicalize().unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_resolve_relative_path() {
        let (_guard, root) = scratch();
        fs::write(root.join("a.txt"), "a").unwrap();

        let resolved = PathChecker::resolve_existing(&root, "a.txt").unwrap();
        assert_eq!(resolved, root.join("a.txt"));
    }

    #[test]
    fn test_resolve_cleans_dot_dot() {
        let (_guard, root) = scratch();
        fs::create_dir(root.join("src")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();

        let resolved = PathChecker::resolve_existing(&root, "src/../a.txt").unwrap();
        assert_eq!(resolved, root.join("a.txt"));
    }

    #[test]
    fn test_resolve_missing_is_not_found() {
        let (_guard, root) = scratch();
        let err = PathChecker::resolve_existing(&root, "missing.txt").unwrap_err();
        assert!(matches!(err, KeeperError::NotFound(p) if p == root.join("missing.txt")));
    }

    #[test]
    fn test_resolve_missing_parent_is_not_found() {
        let (_guard, root) = scratch();
        let err = PathChecker::resolve_existing(&root, "no/such/dir/file").unwrap_err();
        assert!(matches!(err, KeeperError::NotFound(_)));
    }

    #[test]
    fn test_resolve_empty_is_invalid() {
        let (_guard, root) = scratch();
        assert!(matches!(
            PathChecker::resolve_existing(&root, ""),
            Err(KeeperError::InvalidPath(_))
        ));
        assert!(matches!(
            PathChecker::resolve_existing(&root, "   "),
            Err(KeeperError::InvalidPath(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_keeps_trailing_symlink() {
        let (_guard, root) = scratch();
        let target = root.join("target.txt");
        fs::write(&target, "t").unwrap();
        std::os::unix::fs::symlink(&target, root.join("link.txt")).unwrap();

        let resolved = PathChecker::resolve_existing(&root, "link.txt").unwrap();
        assert_eq!(resolved, root.join("link.txt"));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_dangling_symlink_exists() {
        let (_guard, root) = scratch();
        std::os::unix::fs::symlink(root.join("gone"), root.join("dangling")).unwrap();
        assert!(PathChecker::resolve_existing(&root, "dangling").is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_canonicalizes_parent_symlink() {
        let (_guard, root) = scratch();
        let real = root.join("real");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("f.txt"), "f").unwrap();
        std::os::unix::fs::symlink(&real, root.join("alias")).unwrap();

        let resolved = PathChecker::resolve_existing(&root, "alias/f.txt").unwrap();
        assert_eq!(resolved, real.join("f.txt"));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_dot_dot_after_symlink_follows_the_link() {
        let (_guard, root) = scratch();
        fs::create_dir_all(root.join("other").join("inner")).unwrap();
        fs::create_dir(root.join("work")).unwrap();
        fs::write(root.join("other").join("victim.txt"), "o").unwrap();
        fs::write(root.join("work").join("victim.txt"), "w").unwrap();
        std::os::unix::fs::symlink(root.join("other").join("inner"), root.join("work").join("alias"))
            .unwrap();

        let resolved =
            PathChecker::resolve_existing(&root, "work/alias/../victim.txt").unwrap();
        assert_eq!(resolved, root.join("other").join("victim.txt"));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_trailing_dot_dot_through_symlink() {
        let (_guard, root) = scratch();
        fs::create_dir_all(root.join("other").join("inner")).unwrap();
        std::os::unix::fs::symlink(root.join("other").join("inner"), root.join("alias")).unwrap();

        let resolved = PathChecker::resolve_existing(&root, "alias/..").unwrap();
        assert_eq!(resolved, root.join("other"));
    }

    #[test]
    fn test_resolve_dot_is_base() {
        let (_guard, root) = scratch();
        assert_eq!(PathChecker::resolve_existing(&root, ".").unwrap(), root);
        assert_eq!(PathChecker::resolve_existing(&root, "./").unwrap(), root);
    }

    #[test]
    fn test_ends_in_dot_segment() {
        assert!(ends_in_dot_segment("."));
        assert!(ends_in_dot_segment("a/.."));
        assert!(ends_in_dot_segment("a/./"));
        assert!(!ends_in_dot_segment("a/.hidden"));
        assert!(!ends_in_dot_segment("a/b"));
    }

    #[test]
    fn test_root_is_protected() {
        let (_guard, root) = scratch();
        let err =
            PathChecker::check_not_protected(Path::new("/"), &root, &Config::default()).unwrap_err();
        assert!(matches!(err, KeeperError::ProtectedPath { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_top_level_is_protected() {
        let (_guard, root) = scratch();
        assert!(
            PathChecker::check_not_protected(Path::new("/etc"), &root, &Config::default()).is_err()
        );
    }

    #[test]
    fn test_cwd_and_its_parents_are_protected() {
        let (_guard, root) = scratch();
        let cwd = root.join("work");
        fs::create_dir(&cwd).unwrap();

        assert!(PathChecker::check_not_protected(&cwd, &cwd, &Config::default()).is_err());
        assert!(PathChecker::check_not_protected(&root, &cwd, &Config::default()).is_err());
    }

    #[test]
    fn test_child_of_cwd_is_allowed() {
        let (_guard, root) = scratch();
        let child = root.join("child.txt");
        fs::write(&child, "c").unwrap();
        assert!(PathChecker::check_not_protected(&child, &root, &Config::default()).is_ok());
    }

    #[test]
    fn test_home_is_protected() {
        let (_guard, root) = scratch();
        let home = dirs::home_dir().unwrap().canonicalize().unwrap();
        assert!(PathChecker::check_not_protected(&home, &root, &Config::default()).is_err());
    }

    #[test]
    fn test_configured_protected_path() {
        let (_guard, root) = scratch();
        let keep = root.join("keep");
        fs::create_dir_all(keep.join("inner")).unwrap();
        let cwd = TempDir::new().unwrap();

        let config = Config::default().with_protected_paths([keep.to_string_lossy()]);

        let err = PathChecker::check_not_protected(&keep, cwd.path(), &config).unwrap_err();
        match err {
            KeeperError::ProtectedPath { reason, .. } => assert!(reason.contains("configured")),
            other => panic!("Expected ProtectedPath, got {:?}", other),
        }
        // Deleting inside a protected directory is still allowed
        assert!(PathChecker::check_not_protected(&keep.join("inner"), cwd.path(), &config).is_ok());
    }

    #[test]
    fn test_to_absolute_relative() {
        let result = PathChecker::to_absolute(Path::new("/project"), "src/main.rs").unwrap();
        assert_eq!(result, PathBuf::from("/project/src/main.rs"));
    }

    #[test]
    fn test_to_absolute_already_absolute() {
        let result = PathChecker::to_absolute(Path::new("/project"), "/etc/passwd").unwrap();
        assert_eq!(result, PathBuf::from("/etc/passwd"));
    }

    #[test]
    fn test_is_top_level() {
        assert!(PathChecker::is_top_level(Path::new("/tmp")));
        assert!(!PathChecker::is_top_level(Path::new("/tmp/a")));
        assert!(!PathChecker::is_top_level(Path::new("/")));
    }
}
