//! Error types for filekeeper
//!
//! Defines KeeperError and the ErrorKind tag reported to tool callers.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// Stable, serializable classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "NotFoundError")]
    NotFound,
    #[serde(rename = "ConfirmationRequiredError")]
    ConfirmationRequired,
    #[serde(rename = "PermissionError")]
    Permission,
    #[serde(rename = "PartialFailureError")]
    PartialFailure,
    #[serde(rename = "UnsupportedPlatformError")]
    UnsupportedPlatform,
    #[serde(rename = "ProtectedPathError")]
    ProtectedPath,
    #[serde(rename = "InvalidPathError")]
    InvalidPath,
    #[serde(rename = "InvalidArgumentError")]
    InvalidArgument,
    #[serde(rename = "AlreadyExistsError")]
    AlreadyExists,
    #[serde(rename = "IoError")]
    Io,
}

/// filekeeper error type
#[derive(Debug, thiserror::Error)]
pub enum KeeperError {
    // Refusals: nothing on disk was touched (Exit 2)
    /// Empty or otherwise unusable path argument
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// Caller did not confirm a destructive operation
    #[error("deletion of '{}' requires confirmation (confirmed=false)", .path.display())]
    ConfirmationRequired { path: PathBuf },
    /// Root, working directory, home, or a configured protected path
    #[error("refusing to delete protected path '{}': {reason}", .path.display())]
    ProtectedPath { path: PathBuf, reason: String },

    // Operation failures (Exit 1)
    /// Target does not exist
    #[error("cannot access '{}': No such file or directory", .0.display())]
    NotFound(PathBuf),
    /// Host denied access before anything was removed or moved
    #[error("permission denied: '{}'", .path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Recursive removal stopped partway
    #[error(
        "'{}' partially removed: {} entr(ies) removed, {} remaining ({reason})",
        .path.display(),
        .removed.len(),
        .remaining.len()
    )]
    PartialFailure {
        path: PathBuf,
        removed: Vec<PathBuf>,
        remaining: Vec<PathBuf>,
        reason: String,
    },
    /// No usable trash facility; the target was left in place
    #[error("no trash facility available: {reason}")]
    UnsupportedPlatform { reason: String },
    /// Malformed tool argument (date, name, unit...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Destination of a rename or move is already taken
    #[error("'{}' already exists", .0.display())]
    AlreadyExists(PathBuf),
    /// Any other I/O failure
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl KeeperError {
    /// Map an io::Error raised while operating on `path`
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::Permission {
                path: path.to_path_buf(),
                source: err,
            },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::ConfirmationRequired { .. } => ErrorKind::ConfirmationRequired,
            Self::ProtectedPath { .. } => ErrorKind::ProtectedPath,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::PartialFailure { .. } => ErrorKind::PartialFailure,
            Self::UnsupportedPlatform { .. } => ErrorKind::UnsupportedPlatform,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Path the error refers to, when there is one
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::ConfirmationRequired { path }
            | Self::ProtectedPath { path, .. }
            | Self::Permission { path, .. }
            | Self::PartialFailure { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::NotFound(path) | Self::AlreadyExists(path) => Some(path),
            Self::InvalidPath(_)
            | Self::UnsupportedPlatform { .. }
            | Self::InvalidArgument(_) => None,
        }
    }

    /// Exit code for the CLI
    pub fn exit_code(&self) -> u8 {
        match self {
            // Refused before touching the filesystem
            Self::InvalidPath(_) | Self::ConfirmationRequired { .. } | Self::ProtectedPath { .. } => {
                2
            }
            _ => 1,
        }
    }

    /// Message for AI agents and humans, with a remediation hint where one exists
    pub fn user_message(&self) -> String {
        match self {
            Self::ConfirmationRequired { .. } => {
                format!("{}. Re-send the request with confirmed=true.", self)
            }
            Self::PartialFailure { remaining, .. } => {
                let preview: Vec<String> = remaining
                    .iter()
                    .take(5)
                    .map(|p| p.display().to_string())
                    .collect();
                format!("{}. Still present: {}", self, preview.join(", "))
            }
            Self::UnsupportedPlatform { .. } => {
                format!("{}. Nothing was deleted.", self)
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeeperError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_exit_code_refusals_return_2() {
        assert_eq!(KeeperError::InvalidPath(String::new()).exit_code(), 2);
        assert_eq!(
            KeeperError::ConfirmationRequired {
                path: PathBuf::from("/tmp/a.txt")
            }
            .exit_code(),
            2
        );
        assert_eq!(
            KeeperError::ProtectedPath {
                path: PathBuf::from("/"),
                reason: "filesystem root".into()
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_exit_code_failures_return_1() {
        assert_eq!(KeeperError::NotFound(PathBuf::from("missing")).exit_code(), 1);
        assert_eq!(
            KeeperError::UnsupportedPlatform {
                reason: "none".into()
            }
            .exit_code(),
            1
        );
        assert_eq!(
            KeeperError::PartialFailure {
                path: PathBuf::from("/tmp/dir"),
                removed: vec![],
                remaining: vec![],
                reason: "x".into()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_from_io_maps_kinds() {
        let p = Path::new("/tmp/x");
        let err = KeeperError::from_io(p, io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = KeeperError::from_io(p, io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(err.source().is_some());

        let err = KeeperError::from_io(p, io::Error::from(io::ErrorKind::AlreadyExists));
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let err = KeeperError::from_io(p, io::Error::other("boom"));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.path(), Some(p));
    }

    #[test]
    fn test_error_kind_serializes_with_error_suffix() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"NotFoundError\"");
        let json = serde_json::to_string(&ErrorKind::UnsupportedPlatform).unwrap();
        assert_eq!(json, "\"UnsupportedPlatformError\"");
    }

    #[test]
    fn test_user_message_confirmation_hint() {
        let err = KeeperError::ConfirmationRequired {
            path: PathBuf::from("/tmp/a.txt"),
        };
        let msg = err.user_message();
        assert!(msg.contains("/tmp/a.txt"));
        assert!(msg.contains("confirmed=true"));
    }

    #[test]
    fn test_user_message_partial_failure_lists_remaining() {
        let err = KeeperError::PartialFailure {
            path: PathBuf::from("/tmp/dir"),
            removed: vec![PathBuf::from("/tmp/dir/a")],
            remaining: vec![PathBuf::from("/tmp/dir/locked"), PathBuf::from("/tmp/dir")],
            reason: "permission denied".into(),
        };
        let msg = err.user_message();
        assert!(msg.contains("1 entr(ies) removed"));
        assert!(msg.contains("2 remaining"));
        assert!(msg.contains("/tmp/dir/locked"));
    }

    #[test]
    fn test_user_message_unsupported_says_nothing_deleted() {
        let err = KeeperError::UnsupportedPlatform {
            reason: "windows".into(),
        };
        assert!(err.user_message().contains("Nothing was deleted"));
    }

    #[test]
    fn test_path_accessor() {
        let err = KeeperError::NotFound(PathBuf::from("gone.txt"));
        assert_eq!(err.path(), Some(Path::new("gone.txt")));
        assert!(KeeperError::InvalidArgument("x".into()).path().is_none());
    }
}
