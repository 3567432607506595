//! Outcome and report types for batch conversion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ledger::LedgerError;
use crate::probe::{Classification, FormatDescriptor, ProbeError, ProbeResult, TargetFormat};
use crate::transcoder::TranscodeError;

/// Why a conversion did not complete. The original is back in place for
/// every variant except [`FailureReason::RestoreFailed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("backup failed: {message}")]
    BackupFailed { message: String },

    #[error("transcoder failed: {message}")]
    ToolInvocationFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("transcoder timed out after {timeout_secs}s")]
    ToolTimeout { timeout_secs: u64 },

    #[error("output rejected: {message}")]
    VerificationFailed { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    /// The original could not be put back after `cause`.
    #[error("restore failed ({message}) after: {cause}")]
    RestoreFailed { message: String, cause: String },
}

impl FailureReason {
    pub fn verification(message: impl Into<String>) -> Self {
        Self::VerificationFailed {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BackupFailed { .. } => "backup_failed",
            Self::ToolInvocationFailed { .. } => "tool_invocation_failed",
            Self::ToolTimeout { .. } => "tool_timeout",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::Io { .. } => "io",
            Self::RestoreFailed { .. } => "restore_failed",
        }
    }

    /// Whether the original may be lost.
    pub fn is_alarm(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }
}

impl From<TranscodeError> for FailureReason {
    fn from(e: TranscodeError) -> Self {
        match e {
            TranscodeError::ToolTimeout { timeout_secs } => Self::ToolTimeout { timeout_secs },
            TranscodeError::ToolInvocationFailed {
                ref stderr,
                exit_code,
                ..
            } => Self::ToolInvocationFailed {
                message: match stderr {
                    Some(stderr) => format!("{e}: {stderr}"),
                    None => e.to_string(),
                },
                exit_code,
            },
            TranscodeError::Io(io) => Self::io(io.to_string()),
            other => Self::ToolInvocationFailed {
                message: other.to_string(),
                exit_code: None,
            },
        }
    }
}

impl From<LedgerError> for FailureReason {
    fn from(e: LedgerError) -> Self {
        Self::BackupFailed {
            message: e.to_string(),
        }
    }
}

/// Final state of one convertible or canonical file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// Already canonical; not written.
    Unchanged,
    /// Replaced by a verified canonical re-encode.
    Converted,
    Failed { reason: FailureReason },
}

impl ConversionOutcome {
    pub fn failed(reason: FailureReason) -> Self {
        Self::Failed { reason }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Converted => "converted",
            Self::Failed { reason } => reason.kind(),
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Outcome for one file together with what it looked like before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub source_format: FormatDescriptor,
    #[serde(flatten)]
    pub outcome: ConversionOutcome,
}

/// A file the probe could not read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreadableFile {
    pub path: PathBuf,
    /// [`ProbeError::kind`] label.
    pub kind: String,
    pub reason: String,
}

impl UnreadableFile {
    pub fn new(path: &Path, error: &ProbeError) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}

/// A file whose encoding cannot be converted automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub path: PathBuf,
    pub format: FormatDescriptor,
    pub reason: String,
}

impl ReviewItem {
    pub fn new(path: &Path, format: FormatDescriptor) -> Self {
        Self {
            path: path.to_path_buf(),
            format,
            reason: ProbeError::UnsupportedEncoding {
                tag: format.encoding.tag(),
            }
            .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Cancelled,
    TrialFailed,
}

/// A file left untouched because the batch stopped before reaching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
    /// Cancellation arrived between the probe and the backup.
    #[serde(default)]
    pub probed: bool,
}

/// Something an operator has to look at: an original may be lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub path: PathBuf,
    pub message: String,
}

/// A converted file whose backup could not be fully deleted.
///
/// The conversion stands. What is left in the backup directory has to be
/// removed by hand before the next `wavforge restore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleBackup {
    pub path: PathBuf,
    pub message: String,
}

/// A converted file that failed the final re-probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostVerifyFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub probed: usize,
    pub canonical: usize,
    pub converted: usize,
    pub failed: usize,
    pub unreadable: usize,
    pub needs_review: usize,
    pub skipped: usize,
}

/// Everything that happened in one `convert_batch` run.
///
/// Entries are sorted by path, so the report does not depend on worker
/// scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub target: TargetFormat,
    pub counts: BatchCounts,
    pub outcomes: Vec<FileOutcome>,
    pub unreadable: Vec<UnreadableFile>,
    pub needs_review: Vec<ReviewItem>,
    pub skipped: Vec<SkippedFile>,
    pub alarms: Vec<Alarm>,
    pub post_verify_failures: Vec<PostVerifyFailure>,
    #[serde(default)]
    pub stale_backups: Vec<StaleBackup>,
}

impl BatchReport {
    /// Failed conversions with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &FailureReason)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.outcome.failure().map(|r| (o.path.as_path(), r)))
    }

    pub fn outcome_for(&self, path: &Path) -> Option<&ConversionOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.path == path)
            .map(|o| &o.outcome)
    }

    pub fn has_alarms(&self) -> bool {
        !self.alarms.is_empty()
    }

    /// Nothing failed, was unreadable or raised an alarm, and no converted
    /// file left a backup behind.
    pub fn is_clean(&self) -> bool {
        self.counts.failed == 0
            && self.unreadable.is_empty()
            && self.alarms.is_empty()
            && self.post_verify_failures.is_empty()
            && self.stale_backups.is_empty()
    }

    pub(crate) fn compute_counts(&mut self) {
        let mut counts = BatchCounts {
            unreadable: self.unreadable.len(),
            needs_review: self.needs_review.len(),
            skipped: self.skipped.len(),
            ..Default::default()
        };
        for outcome in &self.outcomes {
            match outcome.outcome {
                ConversionOutcome::Unchanged => counts.canonical += 1,
                ConversionOutcome::Converted => counts.converted += 1,
                ConversionOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts.probed = self.outcomes.len()
            + counts.unreadable
            + counts.needs_review
            + self.skipped.iter().filter(|s| s.probed).count();
        self.counts = counts;
    }
}

/// A successfully probed file and where it falls relative to the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbedFile {
    pub path: PathBuf,
    pub result: ProbeResult,
    pub classification: Classification,
}

/// Result of a read-only probe pass, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeSummary {
    pub files: Vec<ProbedFile>,
    pub unreadable: Vec<UnreadableFile>,
}

impl ProbeSummary {
    pub fn with_classification(
        &self,
        classification: Classification,
    ) -> impl Iterator<Item = &ProbedFile> {
        self.files
            .iter()
            .filter(move |f| f.classification == classification)
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.with_classification(classification).count()
    }

    /// Files with a structural anomaly after the format chunk.
    pub fn anomalies(&self) -> impl Iterator<Item = &ProbedFile> {
        self.files.iter().filter(|f| f.result.anomaly.is_some())
    }
}

/// Stops a running batch before any further file is backed up.
///
/// Files already past their backup always finish with a swap or a restore.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
