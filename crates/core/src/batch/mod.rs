//! Batch conversion of a corpus to the canonical encoding.
//!
//! [`TranscodeOrchestrator::probe_all`] classifies files without touching
//! them. [`TranscodeOrchestrator::convert_batch`] converts the convertible
//! ones, each under the protection of the
//! [`SafetyLedger`](crate::ledger::SafetyLedger), and returns a
//! [`BatchReport`] with one entry per file.

mod config;
mod orchestrator;
mod types;

pub use config::BatchConfig;
pub use orchestrator::{TranscodeOrchestrator, ALARM_TARGET};
pub use types::{
    Alarm, BatchCounts, BatchReport, CancelHandle, ConversionOutcome, FailureReason, FileOutcome,
    PostVerifyFailure, ProbeSummary, ProbedFile, ReviewItem, SkipReason, SkippedFile,
    StaleBackup, UnreadableFile,
};
