//! Backup, restore and crash recovery of originals.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::LedgerConfig;
use super::error::LedgerError;
use super::types::{BackupManifest, BackupRecord, FileAttributes, RecoveryFailure, RecoveryReport};
use crate::metrics::BACKUPS_TOTAL;

/// Suffix of the manifest sidecar, appended to the backup file name.
pub const MANIFEST_SUFFIX: &str = ".json";

/// Suffix of the staging copy written next to a file being restored.
pub const RESTORE_SUFFIX: &str = ".wavforge-restore";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Keeps a verified copy of every original while it is being converted.
///
/// The ledger is the only component that touches backup files. It tracks
/// which originals have an outstanding backup and refuses a second backup of
/// the same path, so two conversions can never target one file.
pub struct SafetyLedger {
    config: LedgerConfig,
    /// Original path → backup path. Empty while the copy is in progress.
    outstanding: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl SafetyLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            outstanding: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn backup_dir(&self) -> &Path {
        &self.config.backup_dir
    }

    /// Creates the backup directory and checks that it is writable.
    pub async fn ensure_backup_dir(&self) -> Result<(), LedgerError> {
        let dir = &self.config.backup_dir;
        fs::create_dir_all(dir)
            .await
            .map_err(|e| LedgerError::BackupFailed {
                path: dir.clone(),
                source: e,
            })?;

        let probe = dir.join(format!(".wavforge-write-test-{}", Uuid::new_v4().simple()));
        fs::write(&probe, b"")
            .await
            .map_err(|e| LedgerError::BackupFailed {
                path: dir.clone(),
                source: e,
            })?;
        remove_if_exists(&probe).await?;
        Ok(())
    }

    /// Copies `path` into the backup directory.
    ///
    /// The copy is flushed to disk and checksummed before this returns, and
    /// the manifest is written last, so a manifest on disk always describes
    /// a complete backup.
    pub async fn backup(&self, path: &Path) -> Result<BackupRecord, LedgerError> {
        {
            let mut outstanding = self.outstanding.lock().await;
            if outstanding.contains_key(path) {
                return Err(LedgerError::DuplicateBackup {
                    path: path.to_path_buf(),
                });
            }
            outstanding.insert(path.to_path_buf(), PathBuf::new());
        }

        let result = self.write_backup(path).await;

        let mut outstanding = self.outstanding.lock().await;
        match result {
            Ok(record) => {
                outstanding.insert(path.to_path_buf(), record.backup_path.clone());
                BACKUPS_TOTAL.with_label_values(&["created"]).inc();
                debug!(
                    original = %path.display(),
                    backup = %record.backup_path.display(),
                    size_bytes = record.size_bytes,
                    "backup created"
                );
                Ok(record)
            }
            Err(e) => {
                outstanding.remove(path);
                Err(e)
            }
        }
    }

    async fn write_backup(&self, path: &Path) -> Result<BackupRecord, LedgerError> {
        let backup_failed = |e: std::io::Error| LedgerError::BackupFailed {
            path: path.to_path_buf(),
            source: e,
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());
        let absolute = std::path::absolute(path).map_err(backup_failed)?;
        let attributes = FileAttributes::from_metadata(
            &fs::metadata(path).await.map_err(backup_failed)?,
        );

        fs::create_dir_all(&self.config.backup_dir)
            .await
            .map_err(backup_failed)?;

        let backup_path = self
            .config
            .backup_dir
            .join(format!("{}-{}", Uuid::new_v4().simple(), name));
        let manifest_path = with_suffix(&backup_path, MANIFEST_SUFFIX);

        let result = async {
            let (size_bytes, checksum) = self
                .copy_with_checksum(path, &backup_path)
                .await
                .map_err(backup_failed)?;

            if self.config.verify_checksums {
                let actual = self
                    .calculate_checksum(&backup_path)
                    .await
                    .map_err(backup_failed)?;
                if actual != checksum {
                    return Err(LedgerError::ChecksumMismatch {
                        path: backup_path.clone(),
                        expected: checksum,
                        actual,
                    });
                }
            }

            let created_at = Utc::now();
            let manifest = BackupManifest {
                original_path: absolute,
                checksum: checksum.clone(),
                size_bytes,
                created_at,
                attributes: Some(attributes.clone()),
            };
            self.write_manifest(&manifest_path, &manifest).await?;

            Ok(BackupRecord {
                original_path: path.to_path_buf(),
                backup_path: backup_path.clone(),
                manifest_path: manifest_path.clone(),
                checksum,
                size_bytes,
                created_at,
                attributes,
            })
        }
        .await;

        if result.is_err() {
            let _ = remove_if_exists(&manifest_path).await;
            let _ = remove_if_exists(&backup_path).await;
        }
        result
    }

    /// Puts the original back, with its permissions and modification time,
    /// and deletes the backup.
    ///
    /// Works whether the original was modified, replaced or deleted. On
    /// failure the backup stays on disk and the original stays listed in
    /// [`outstanding`](Self::outstanding). [`recover`](Self::recover) skips
    /// backups this ledger still holds, so only a fresh process (`wavforge
    /// restore`) can retry it.
    pub async fn restore(&self, record: BackupRecord) -> Result<(), LedgerError> {
        self.restore_file(
            &record.backup_path,
            &record.original_path,
            &record.checksum,
            Some(&record.attributes),
        )
        .await?;

        if let Err(e) = self
            .discard_backup(&record.manifest_path, &record.backup_path)
            .await
        {
            warn!(
                backup = %record.backup_path.display(),
                error = %e,
                "original restored but backup could not be deleted"
            );
        }
        self.forget(&record.original_path).await;
        BACKUPS_TOTAL.with_label_values(&["restored"]).inc();
        info!(path = %record.original_path.display(), "original restored from backup");
        Ok(())
    }

    /// Deletes a backup that is no longer needed.
    ///
    /// The backup copy is deleted even when the manifest cannot be. A
    /// manifest left without its copy makes [`recover`](Self::recover)
    /// report a failure instead of reverting the converted file.
    pub async fn release(&self, record: BackupRecord) -> Result<(), LedgerError> {
        self.forget(&record.original_path).await;
        let manifest = remove_if_exists(&record.manifest_path).await;
        let backup = remove_if_exists(&record.backup_path).await;
        manifest.map_err(|e| LedgerError::ReleaseFailed {
            path: record.manifest_path.clone(),
            source: e,
        })?;
        backup.map_err(|e| LedgerError::ReleaseFailed {
            path: record.backup_path.clone(),
            source: e,
        })?;
        BACKUPS_TOTAL.with_label_values(&["released"]).inc();
        debug!(path = %record.original_path.display(), "backup released");
        Ok(())
    }

    /// Originals that currently have a backup, sorted.
    pub async fn outstanding(&self) -> Vec<PathBuf> {
        let outstanding = self.outstanding.lock().await;
        let mut paths: Vec<PathBuf> = outstanding.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Restores every original whose backup survived an interrupted run.
    ///
    /// Backups currently held by this ledger are left alone.
    pub async fn recover(&self) -> Result<RecoveryReport, LedgerError> {
        let mut report = RecoveryReport::default();

        let mut entries = match fs::read_dir(&self.config.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let mut manifests = Vec::new();
        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_manifest = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX));
            if is_manifest {
                manifests.push(path);
            } else {
                backups.push(path);
            }
        }
        manifests.sort();
        backups.sort();

        let in_use: HashSet<PathBuf> = {
            let outstanding = self.outstanding.lock().await;
            outstanding.values().cloned().collect()
        };

        let mut claimed = HashSet::new();
        for manifest_path in manifests {
            let Some(backup_path) = manifest_path
                .to_str()
                .and_then(|p| p.strip_suffix(MANIFEST_SUFFIX))
                .map(PathBuf::from)
            else {
                continue;
            };
            claimed.insert(backup_path.clone());
            if in_use.contains(&backup_path) {
                continue;
            }

            match self.recover_one(&manifest_path, &backup_path).await {
                Ok(original) => report.restored.push(original),
                Err((original_path, e)) => {
                    warn!(manifest = %manifest_path.display(), error = %e, "recovery failed");
                    report.failed.push(RecoveryFailure {
                        manifest_path,
                        original_path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.orphans = backups
            .into_iter()
            .filter(|b| !claimed.contains(b) && !in_use.contains(b))
            .collect();

        info!(
            restored = report.restored.len(),
            failed = report.failed.len(),
            orphans = report.orphans.len(),
            "recovery finished"
        );
        Ok(report)
    }

    async fn recover_one(
        &self,
        manifest_path: &Path,
        backup_path: &Path,
    ) -> Result<PathBuf, (Option<PathBuf>, LedgerError)> {
        let manifest = self
            .read_manifest(manifest_path)
            .await
            .map_err(|e| (None, e))?;
        let original = manifest.original_path.clone();

        self.restore_file(
            backup_path,
            &original,
            &manifest.checksum,
            manifest.attributes.as_ref(),
        )
        .await
            .map_err(|e| (Some(original.clone()), e))?;

        if let Err(e) = self.discard_backup(manifest_path, backup_path).await {
            warn!(backup = %backup_path.display(), error = %e, "recovered backup could not be deleted");
        }
        BACKUPS_TOTAL.with_label_values(&["restored"]).inc();
        info!(path = %original.display(), "original recovered from backup");
        Ok(original)
    }

    /// Copies `backup` to a staging file next to `target`, checks it and
    /// renames it over `target`.
    async fn restore_file(
        &self,
        backup: &Path,
        target: &Path,
        expected_checksum: &str,
        attributes: Option<&FileAttributes>,
    ) -> Result<(), LedgerError> {
        if !fs::try_exists(backup).await.unwrap_or(false) {
            return Err(LedgerError::restore_failed(
                target,
                format!("backup {} is missing", backup.display()),
            ));
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                LedgerError::restore_failed(target, format!("cannot create parent directory: {e}"))
            })?;
        }

        let staging = with_suffix(target, RESTORE_SUFFIX);
        let result = async {
            let (_, copied) = self
                .copy_with_checksum(backup, &staging)
                .await
                .map_err(|e| LedgerError::restore_failed(target, format!("copy from backup failed: {e}")))?;
            if copied != expected_checksum {
                return Err(LedgerError::restore_failed(
                    target,
                    format!("backup checksum mismatch: expected {expected_checksum}, got {copied}"),
                ));
            }

            if self.config.verify_checksums {
                let written = self.calculate_checksum(&staging).await.map_err(|e| {
                    LedgerError::restore_failed(target, format!("cannot verify restored copy: {e}"))
                })?;
                if written != expected_checksum {
                    return Err(LedgerError::restore_failed(
                        target,
                        format!("restored copy checksum mismatch: expected {expected_checksum}, got {written}"),
                    ));
                }
            }

            // Metadata failures never block putting the bytes back.
            if let Some(attributes) = attributes {
                if let Err(e) = attributes.apply(&staging).await {
                    warn!(path = %target.display(), error = %e, "could not restore permissions or mtime");
                }
            }

            fs::rename(&staging, target)
                .await
                .map_err(|e| LedgerError::restore_failed(target, format!("rename failed: {e}")))
        }
        .await;

        if result.is_err() {
            let _ = remove_if_exists(&staging).await;
        }
        result
    }

    /// The manifest goes first: a backup without a manifest is an orphan,
    /// never a recovery candidate.
    async fn discard_backup(&self, manifest: &Path, backup: &Path) -> Result<(), LedgerError> {
        remove_if_exists(manifest)
            .await
            .map_err(|e| LedgerError::ReleaseFailed {
                path: manifest.to_path_buf(),
                source: e,
            })?;
        remove_if_exists(backup)
            .await
            .map_err(|e| LedgerError::ReleaseFailed {
                path: backup.to_path_buf(),
                source: e,
            })
    }

    async fn forget(&self, original: &Path) {
        self.outstanding.lock().await.remove(original);
    }

    async fn write_manifest(
        &self,
        path: &Path,
        manifest: &BackupManifest,
    ) -> Result<(), LedgerError> {
        let json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| LedgerError::manifest(path, e.to_string()))?;
        let mut file = File::create(path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn read_manifest(&self, path: &Path) -> Result<BackupManifest, LedgerError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| LedgerError::manifest(path, e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| LedgerError::manifest(path, e.to_string()))
    }

    /// Streams `source` into `destination`, hashing on the way, and syncs the
    /// destination to disk.
    async fn copy_with_checksum(
        &self,
        source: &Path,
        destination: &Path,
    ) -> std::io::Result<(u64, String)> {
        let source_file = File::open(source).await?;
        let dest_file = File::create(destination).await?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, dest_file);
        let mut hasher = Sha256::new();
        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; self.config.buffer_size];

        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            writer.write_all(&buffer[..bytes_read]).await?;
            total_bytes += bytes_read as u64;
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        Ok((total_bytes, format!("{:x}", hasher.finalize())))
    }

    async fn calculate_checksum(&self, path: &Path) -> std::io::Result<String> {
        let file = File::open(path).await?;
        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.config.buffer_size];

        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}
