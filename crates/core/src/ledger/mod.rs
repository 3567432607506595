//! Safety ledger: per-file backups that make in-place conversion reversible.
//!
//! Every original gets a checksummed copy in the backup directory before it
//! is touched. Each [`BackupRecord`] ends in exactly one of two ways:
//! [`SafetyLedger::release`] after a verified swap, or
//! [`SafetyLedger::restore`] after any failure. Backups left behind by a
//! crash are put back by [`SafetyLedger::recover`].

mod config;
mod error;
mod safety_ledger;
mod types;

pub use config::LedgerConfig;
pub use error::LedgerError;
pub use safety_ledger::{SafetyLedger, MANIFEST_SUFFIX, RESTORE_SUFFIX};
pub use types::{BackupManifest, BackupRecord, FileAttributes, RecoveryFailure, RecoveryReport};
