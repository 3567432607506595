//! Error types for the safety ledger.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while backing up or restoring originals.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Copying the original into the backup directory failed.
    #[error("Failed to back up {path}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A backup for this original is already outstanding.
    #[error("A backup for {path} is already outstanding")]
    DuplicateBackup { path: PathBuf },

    /// A copy did not hash to the expected value.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The original could not be put back. Data may be lost.
    #[error("Failed to restore {path}: {reason}")]
    RestoreFailed { path: PathBuf, reason: String },

    /// Deleting a backup that is no longer needed failed.
    #[error("Failed to release backup {path}")]
    ReleaseFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest sidecar could not be written or parsed.
    #[error("Invalid backup manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Creates a restore failed error.
    pub fn restore_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::RestoreFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a manifest error.
    pub fn manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the original file may be lost.
    pub fn is_data_loss_risk(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }
}
