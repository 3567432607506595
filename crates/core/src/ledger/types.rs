//! Types for the safety ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{FileTimes, Metadata, Permissions};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Permissions and modification time of an original at backup time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileAttributes {
    /// Unix permission bits. `None` on other platforms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl FileAttributes {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            Some(metadata.permissions().mode() & 0o7777)
        };
        #[cfg(not(unix))]
        let mode = None;

        Self {
            mode,
            readonly: metadata.permissions().readonly(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }

    fn permissions(&self, mut current: Permissions) -> Permissions {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = self.mode {
                current.set_mode(mode);
                return current;
            }
        }
        current.set_readonly(self.readonly);
        current
    }

    /// Gives `path` these permissions.
    pub async fn apply_permissions(&self, path: &Path) -> std::io::Result<()> {
        let current = fs::metadata(path).await?.permissions();
        fs::set_permissions(path, self.permissions(current)).await
    }

    /// Gives `path` this modification time, then these permissions. The
    /// time goes first since a read-only mode would block opening for it.
    pub async fn apply(&self, path: &Path) -> std::io::Result<()> {
        if let Some(modified) = self.modified {
            let file = fs::OpenOptions::new().write(true).open(path).await?;
            file.into_std()
                .await
                .set_times(FileTimes::new().set_modified(modified.into()))?;
        }
        self.apply_permissions(path).await
    }
}

/// Proof that an original has a verified backup.
///
/// Not `Clone`: [`SafetyLedger::release`] and
/// [`SafetyLedger::restore`] consume it, so every backup is finalized exactly
/// once.
///
/// [`SafetyLedger::release`]: super::SafetyLedger::release
/// [`SafetyLedger::restore`]: super::SafetyLedger::restore
#[derive(Debug)]
pub struct BackupRecord {
    pub(crate) original_path: PathBuf,
    pub(crate) backup_path: PathBuf,
    pub(crate) manifest_path: PathBuf,
    pub(crate) checksum: String,
    pub(crate) size_bytes: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) attributes: FileAttributes,
}

impl BackupRecord {
    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Hex SHA-256 of the original at backup time.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// What the original looked like before it was touched.
    pub fn attributes(&self) -> &FileAttributes {
        &self.attributes
    }
}

/// JSON sidecar written next to each backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Absolute path of the original.
    pub original_path: PathBuf,
    pub checksum: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Missing from hand-written manifests; recovery then keeps the
    /// attributes of the fresh copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<FileAttributes>,
}

/// A leftover backup that could not be put back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryFailure {
    pub manifest_path: PathBuf,
    pub original_path: Option<PathBuf>,
    pub reason: String,
}

/// Result of scanning the backup directory after an interrupted run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Originals that were put back.
    pub restored: Vec<PathBuf>,
    pub failed: Vec<RecoveryFailure>,
    /// Backup files without a manifest. The run died before the backup
    /// completed, so the original was never touched.
    pub orphans: Vec<PathBuf>,
}

impl RecoveryReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
