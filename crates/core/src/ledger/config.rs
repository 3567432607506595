//! Configuration for the safety ledger.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where and how backups are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding backups and their manifests.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Re-read each copy and compare SHA-256 digests.
    #[serde(default = "default_verify_checksums")]
    pub verify_checksums: bool,

    /// Buffer size for file copies.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("wavforge-backups")
}

fn default_verify_checksums() -> bool {
    true
}

fn default_buffer_size() -> usize {
    1024 * 1024 // 1 MiB
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            verify_checksums: default_verify_checksums(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl LedgerConfig {
    /// Creates a config with backups in `backup_dir`.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            ..Default::default()
        }
    }

    /// Enables or disables checksum verification of copies.
    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Sets the copy buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.backup_dir, PathBuf::from("wavforge-backups"));
        assert!(config.verify_checksums);
        assert_eq!(config.buffer_size, 1024 * 1024);
    }

    #[test]
    fn test_config_builder() {
        let config = LedgerConfig::new("/var/backups/corpus")
            .with_checksum_verification(false)
            .with_buffer_size(4096);
        assert_eq!(config.backup_dir, PathBuf::from("/var/backups/corpus"));
        assert!(!config.verify_checksums);
        assert_eq!(config.buffer_size, 4096);
    }
}
