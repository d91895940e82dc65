//! Trash backends for recoverable deletion
//!
//! Freedesktop.org layout on Linux/BSD (`files/` + `info/*.trashinfo`),
//! the flat `~/.Trash` folder on macOS, and an explicit "unsupported"
//! backend everywhere else. A target on another mount than the home trash
//! goes to that mount's `$topdir/.Trash/$uid` or `$topdir/.Trash-$uid`.
//! No backend ever falls back to permanent removal.

use crate::config::{covers, Config};
use crate::error::{KeeperError, Result};
use chrono::Local;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const TRASHINFO_EXTENSION: &str = "trashinfo";
pub const TRASHINFO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Upper bound on `name_N` collision suffixes
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// A place a file can be relocated to instead of being erased
pub trait TrashBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Move `path` (canonical, existing) into the trash and return its new location
    fn move_to_trash(&self, path: &Path) -> Result<PathBuf>;
}

/// On-disk arrangement of a trash directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashLayout {
    /// `root/files/<name>` plus `root/info/<name>.trashinfo`
    Freedesktop,
    /// `root/<name>` (macOS ~/.Trash)
    Flat,
}

/// Trash rooted at a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct DirectoryTrash {
    root: PathBuf,
    layout: TrashLayout,
    /// Mount top for per-mount trashes; `Path=` is then relative to it
    topdir: Option<PathBuf>,
}

impl DirectoryTrash {
    pub fn new(root: impl Into<PathBuf>, layout: TrashLayout) -> Self {
        Self {
            root: root.into(),
            layout,
            topdir: None,
        }
    }

    /// Per-mount trash under `topdir` for user `uid`
    ///
    /// `$topdir/.Trash/$uid` when `$topdir/.Trash` is a real sticky
    /// directory, `$topdir/.Trash-$uid` otherwise. Created with mode 0700.
    #[cfg(unix)]
    pub fn for_mount(topdir: &Path, uid: u32) -> io::Result<Self> {
        use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

        let shared = topdir.join(".Trash");
        let shared_ok = fs::symlink_metadata(&shared)
            .map(|m| m.is_dir() && m.permissions().mode() & 0o1000 != 0)
            .unwrap_or(false);
        let root = if shared_ok {
            shared.join(uid.to_string())
        } else {
            topdir.join(format!(".Trash-{}", uid))
        };

        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&root)?;

        Ok(Self {
            root,
            layout: TrashLayout::Freedesktop,
            topdir: Some(topdir.to_path_buf()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files_dir(&self) -> PathBuf {
        match self.layout {
            TrashLayout::Freedesktop => self.root.join("files"),
            TrashLayout::Flat => self.root.clone(),
        }
    }

    fn info_dir(&self) -> PathBuf {
        self.root.join("info")
    }

    fn prepare(&self) -> Result<()> {
        let mut dirs = vec![self.files_dir()];
        if self.layout == TrashLayout::Freedesktop {
            dirs.push(self.info_dir());
        }
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|e| KeeperError::UnsupportedPlatform {
                reason: format!("cannot prepare trash directory '{}': {}", dir.display(), e),
            })?;
        }
        Ok(())
    }

    /// Reserve a free name in the trash
    ///
    /// For the Freedesktop layout the `.trashinfo` file is created with
    /// `create_new`, which is the reservation; for the flat layout the name is
    /// only checked, the rename below is the reservation.
    fn reserve(&self, original: &Path) -> Result<(OsString, Option<fs::File>)> {
        let base = original
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| KeeperError::InvalidPath(original.display().to_string()))?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = unique_name(&base, attempt);
            if self.files_dir().join(&candidate).symlink_metadata().is_ok() {
                continue;
            }
            match self.layout {
                TrashLayout::Flat => return Ok((candidate, None)),
                TrashLayout::Freedesktop => {
                    let info_path = self.info_path(&candidate);
                    match OpenOptions::new().write(true).create_new(true).open(&info_path) {
                        Ok(file) => return Ok((candidate, Some(file))),
                        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                        Err(e) => {
                            return Err(KeeperError::UnsupportedPlatform {
                                reason: format!(
                                    "cannot write '{}': {}",
                                    info_path.display(),
                                    e
                                ),
                            })
                        }
                    }
                }
            }
        }

        Err(KeeperError::UnsupportedPlatform {
            reason: format!(
                "no free name for '{}' in trash '{}'",
                original.display(),
                self.root.display()
            ),
        })
    }

    fn info_path(&self, name: &OsString) -> PathBuf {
        let mut file = name.clone();
        file.push(".");
        file.push(TRASHINFO_EXTENSION);
        self.info_dir().join(file)
    }
}

impl TrashBackend for DirectoryTrash {
    fn name(&self) -> &'static str {
        match self.layout {
            TrashLayout::Freedesktop => "freedesktop",
            TrashLayout::Flat => "macos",
        }
    }

    fn move_to_trash(&self, path: &Path) -> Result<PathBuf> {
        match self.move_into(path)? {
            Ok(destination) => Ok(destination),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices && self.topdir.is_none() => {
                self.move_to_mount_trash(path)
            }
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                Err(KeeperError::UnsupportedPlatform {
                    reason: format!(
                        "trash '{}' is on a different filesystem than '{}'",
                        self.root.display(),
                        path.display()
                    ),
                })
            }
            Err(e) => Err(KeeperError::from_io(path, e)),
        }
    }
}

impl DirectoryTrash {
    /// Reserve a name, write the info file and rename
    ///
    /// The inner error is the failed rename; its info file is already gone.
    fn move_into(&self, path: &Path) -> Result<io::Result<PathBuf>> {
        let canonical_root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        if covers(path, &canonical_root) {
            return Err(KeeperError::ProtectedPath {
                path: path.to_path_buf(),
                reason: "contains the trash directory itself".into(),
            });
        }

        self.prepare()?;
        let (name, info_file) = self.reserve(path)?;
        let info_path = self.info_path(&name);

        if let Some(mut file) = info_file {
            let contents = trash_info(&self.info_path_value(path));
            if let Err(e) = file.write_all(contents.as_bytes()) {
                let _ = fs::remove_file(&info_path);
                return Err(KeeperError::UnsupportedPlatform {
                    reason: format!("cannot write '{}': {}", info_path.display(), e),
                });
            }
        }

        let destination = self.files_dir().join(&name);
        if let Err(e) = crate::relocate::rename_no_replace(path, &destination) {
            if self.layout == TrashLayout::Freedesktop {
                let _ = fs::remove_file(&info_path);
            }
            return Ok(Err(e));
        }

        tracing::debug!(
            backend = self.name(),
            from = %path.display(),
            to = %destination.display(),
            "moved to trash"
        );
        Ok(Ok(destination))
    }

    #[cfg(unix)]
    fn move_to_mount_trash(&self, path: &Path) -> Result<PathBuf> {
        let unusable = |e: io::Error| KeeperError::UnsupportedPlatform {
            reason: format!(
                "'{}' is on another filesystem than trash '{}' and its mount has no usable trash: {}",
                path.display(),
                self.root.display(),
                e
            ),
        };

        let topdir = mount_top(path).map_err(unusable)?;
        // SAFETY: getuid has no preconditions and cannot fail
        let uid = unsafe { libc::getuid() };
        let mount_trash = DirectoryTrash::for_mount(&topdir, uid).map_err(unusable)?;
        tracing::debug!(trash = %mount_trash.root.display(), "using per-mount trash");
        mount_trash.move_to_trash(path)
    }

    #[cfg(not(unix))]
    fn move_to_mount_trash(&self, path: &Path) -> Result<PathBuf> {
        Err(KeeperError::UnsupportedPlatform {
            reason: format!(
                "trash '{}' is on a different filesystem than '{}'",
                self.root.display(),
                path.display()
            ),
        })
    }

    /// `Path=` value: absolute for the home trash, relative to the mount top otherwise
    fn info_path_value(&self, original: &Path) -> String {
        let full = encode_trash_path(original);
        let Some(topdir) = &self.topdir else {
            return full;
        };
        let top = encode_trash_path(topdir);
        if let Some(rest) = full.strip_prefix(top.trim_end_matches('/')) {
            return rest.trim_start_matches('/').to_string();
        }
        full
    }
}

/// Highest ancestor of `path` on the same device as `path`
#[cfg(unix)]
pub fn mount_top(path: &Path) -> io::Result<PathBuf> {
    use std::os::unix::fs::MetadataExt;

    let dev = fs::symlink_metadata(path)?.dev();
    let mut top = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf());
    for ancestor in path.ancestors().skip(1) {
        match fs::metadata(ancestor) {
            Ok(meta) if meta.dev() == dev => top = ancestor.to_path_buf(),
            _ => break,
        }
    }
    Ok(top)
}

/// Backend for hosts without a trash facility: always refuses
#[derive(Debug, Clone)]
pub struct NoTrash {
    reason: String,
}

impl NoTrash {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TrashBackend for NoTrash {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn move_to_trash(&self, _path: &Path) -> Result<PathBuf> {
        Err(KeeperError::UnsupportedPlatform {
            reason: self.reason.clone(),
        })
    }
}

/// Pick the trash backend for this host
pub fn detect(config: &Config) -> Box<dyn TrashBackend> {
    if let Some(root) = config.trash_dir() {
        return Box::new(DirectoryTrash::new(root, TrashLayout::Freedesktop));
    }
    platform_default()
}

#[cfg(target_os = "macos")]
fn platform_default() -> Box<dyn TrashBackend> {
    match dirs::home_dir() {
        Some(home) => Box::new(DirectoryTrash::new(home.join(".Trash"), TrashLayout::Flat)),
        None => Box::new(NoTrash::new("home directory not found")),
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_default() -> Box<dyn TrashBackend> {
    // $XDG_DATA_HOME/Trash, i.e. ~/.local/share/Trash by default
    match dirs::data_dir() {
        Some(data) => Box::new(DirectoryTrash::new(
            data.join("Trash"),
            TrashLayout::Freedesktop,
        )),
        None => Box::new(NoTrash::new("XDG data directory not found")),
    }
}

#[cfg(not(unix))]
fn platform_default() -> Box<dyn TrashBackend> {
    Box::new(NoTrash::new(
        "recycle bin integration is not available on this platform",
    ))
}

fn unique_name(base: &OsString, attempt: u32) -> OsString {
    if attempt == 0 {
        return base.clone();
    }
    let mut name = base.clone();
    name.push(format!("_{}", attempt));
    name
}

/// Contents of a `.trashinfo` file
fn trash_info(encoded_path: &str) -> String {
    format!(
        "[Trash Info]\nPath={}\nDeletionDate={}\n",
        encoded_path,
        Local::now().format(TRASHINFO_TIME_FORMAT)
    )
}

/// Percent-encode an absolute path the way file:// URLs do
fn encode_trash_path(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}
