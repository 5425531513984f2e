//! Error types for scanning and aggregate queries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// An ignore pattern failed to compile.
    #[error("Invalid ignore pattern: {message}")]
    InvalidPattern { message: String },

    /// Snapshot file could not be decoded.
    #[error("Invalid snapshot {path}: {message}")]
    InvalidSnapshot { path: PathBuf, message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Failure of an aggregate query.
///
/// Any of these aborts a partitioning run: the source is considered
/// unavailable and no bucket output is produced.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached or refused the session.
    #[error("Aggregate source unavailable for {path}: {message}")]
    Unavailable { path: String, message: String },

    /// The queried path does not exist in the source.
    #[error("No such directory in aggregate source: {path}")]
    NotFound { path: String },

    /// The queried path exists but is not a directory.
    #[error("Not a directory in aggregate source: {path}")]
    NotADirectory { path: String },
}

impl SourceError {
    /// Create an unavailable error.
    pub fn unavailable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Path of the query that failed.
    pub fn path(&self) -> &str {
        match self {
            Self::Unavailable { path, .. }
            | Self::NotFound { path }
            | Self::NotADirectory { path } => path,
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Symbolic link target does not exist.
    BrokenSymlink,
    /// Error reading file/directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal warning encountered during scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a broken symlink warning.
    pub fn broken_symlink(path: impl Into<PathBuf>, target: &str) -> Self {
        let path = path.into();
        Self {
            message: format!("Broken symlink: {} -> {target}", path.display()),
            path,
            kind: WarningKind::BrokenSymlink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_io() {
        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ScanError::PermissionDenied { .. }));
    }

    #[test]
    fn test_source_error_path() {
        let err = SourceError::unavailable("/data/", "connection refused");
        assert_eq!(err.path(), "/data/");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_broken_symlink_warning() {
        let warning = ScanWarning::broken_symlink("/test/link", "/gone");
        assert_eq!(warning.kind, WarningKind::BrokenSymlink);
        assert!(warning.message.contains("/gone"));
    }
}
