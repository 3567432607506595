//! Batch conversion with per-file backup and rollback.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ledger::{BackupRecord, SafetyLedger};
use crate::metrics::{CONVERSIONS_TOTAL, CONVERSION_DURATION, FILES_PROBED, RESTORE_FAILURES};
use crate::probe::{probe_path, Classification, ProbeError, ProbeResult, TargetFormat};
use crate::transcoder::{TranscodeRequest, Transcoder};

use super::config::BatchConfig;
use super::types::{
    Alarm, BatchCounts, BatchReport, CancelHandle, ConversionOutcome, FailureReason, FileOutcome,
    PostVerifyFailure, ProbeSummary, ProbedFile, ReviewItem, SkipReason, SkippedFile,
    StaleBackup, UnreadableFile,
};

/// Log target for events that need an operator.
pub const ALARM_TARGET: &str = "wavforge::alarm";

/// Runs the probe on the blocking pool.
async fn probe_blocking(path: PathBuf) -> Result<ProbeResult, ProbeError> {
    tokio::task::spawn_blocking(move || probe_path(&path))
        .await
        .unwrap_or_else(|e| {
            Err(ProbeError::Io(std::io::Error::other(format!(
                "probe task failed: {e}"
            ))))
        })
}

/// Sibling path the transcoder writes to. Same directory, so the final
/// rename stays on one filesystem.
fn temp_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = format!(".{}.{}.tmp.wav", stem, Uuid::new_v4().simple());
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn classification_label(classification: Classification) -> &'static str {
    match classification {
        Classification::Canonical => "canonical",
        Classification::Convertible => "convertible",
        Classification::NeedsReview => "needs_review",
    }
}

fn sorted_unique(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = files.to_vec();
    files.sort();
    files.dedup();
    files
}

/// Where one file ended up.
#[derive(Debug)]
enum FileEntry {
    Outcome(FileOutcome, Option<StaleBackup>),
    Unreadable(UnreadableFile),
    NeedsReview(ReviewItem),
    Skipped(SkippedFile),
}

impl FileEntry {
    fn skipped(path: &Path, reason: SkipReason) -> Self {
        Self::Skipped(SkippedFile {
            path: path.to_path_buf(),
            reason,
            probed: false,
        })
    }

    fn cancelled_after_probe(path: &Path) -> Self {
        Self::Skipped(SkippedFile {
            path: path.to_path_buf(),
            reason: SkipReason::Cancelled,
            probed: true,
        })
    }

    /// A backup was attempted for this file.
    fn attempted_conversion(&self) -> bool {
        matches!(self, Self::Outcome(o, _) if o.outcome != ConversionOutcome::Unchanged)
    }

    fn is_failed(&self) -> bool {
        matches!(self, Self::Outcome(o, _) if o.outcome.failure().is_some())
    }
}

/// Per-file pipeline shared by all workers.
struct Worker<T: Transcoder> {
    transcoder: Arc<T>,
    ledger: Arc<SafetyLedger>,
    target: TargetFormat,
    max_duration_drift: f64,
    cancel: CancelHandle,
}

impl<T: Transcoder> Clone for Worker<T> {
    fn clone(&self) -> Self {
        Self {
            transcoder: Arc::clone(&self.transcoder),
            ledger: Arc::clone(&self.ledger),
            target: self.target,
            max_duration_drift: self.max_duration_drift,
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: Transcoder> Worker<T> {
    async fn process(&self, path: &Path) -> FileEntry {
        if self.cancel.is_cancelled() {
            return FileEntry::skipped(path, SkipReason::Cancelled);
        }

        let probed = match probe_blocking(path.to_path_buf()).await {
            Ok(probed) => probed,
            Err(e) => {
                FILES_PROBED.with_label_values(&[e.kind()]).inc();
                warn!(path = %path.display(), error = %e, "unreadable file");
                return FileEntry::Unreadable(UnreadableFile::new(path, &e));
            }
        };

        let classification = probed.classify(&self.target);
        FILES_PROBED
            .with_label_values(&[classification_label(classification)])
            .inc();
        if let Some(anomaly) = &probed.anomaly {
            warn!(path = %path.display(), %anomaly, "structural anomaly");
        }

        match classification {
            Classification::Canonical => {
                return FileEntry::Outcome(
                    FileOutcome {
                        path: path.to_path_buf(),
                        source_format: probed.format,
                        outcome: ConversionOutcome::Unchanged,
                    },
                    None,
                );
            }
            Classification::NeedsReview => {
                info!(path = %path.display(), format = %probed.format, "needs manual review");
                return FileEntry::NeedsReview(ReviewItem::new(path, probed.format));
            }
            Classification::Convertible => {}
        }

        if self.cancel.is_cancelled() {
            return FileEntry::cancelled_after_probe(path);
        }

        let start = Instant::now();
        let (outcome, stale) = self.convert(path, &probed).await;
        let label = outcome.label();
        CONVERSIONS_TOTAL.with_label_values(&[label]).inc();
        CONVERSION_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        FileEntry::Outcome(
            FileOutcome {
                path: path.to_path_buf(),
                source_format: probed.format,
                outcome,
            },
            stale,
        )
    }

    /// Backup, transcode to a temp file, verify, swap. Any failure after
    /// the backup restores the original. The converted file keeps the
    /// original's permissions.
    async fn convert(
        &self,
        path: &Path,
        probed: &ProbeResult,
    ) -> (ConversionOutcome, Option<StaleBackup>) {
        let record = match self.ledger.backup(path).await {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "backup failed, file left untouched");
                return (ConversionOutcome::failed(e.into()), None);
            }
        };

        let temp = temp_path_for(path);
        let result = match self.transcode_and_verify(path, &temp, probed).await {
            Ok(()) => {
                if let Err(e) = record.attributes().apply_permissions(&temp).await {
                    warn!(path = %path.display(), error = %e, "could not carry permissions over to converted file");
                }
                fs::rename(&temp, path).await.map_err(|e| {
                    FailureReason::io(format!("failed to swap converted file into place: {e}"))
                })
            }
            Err(reason) => Err(reason),
        };

        match result {
            Ok(()) => {
                let stale = match self.ledger.release(record).await {
                    Ok(()) => None,
                    Err(e) => {
                        error!(
                            target: ALARM_TARGET,
                            path = %path.display(),
                            error = %e,
                            "converted, but the backup could not be deleted; remove it before running `wavforge restore`"
                        );
                        Some(StaleBackup {
                            path: path.to_path_buf(),
                            message: e.to_string(),
                        })
                    }
                };
                debug!(path = %path.display(), from = %probed.format, "converted");
                (ConversionOutcome::Converted, stale)
            }
            Err(reason) => (self.roll_back(record, &temp, reason).await, None),
        }
    }

    async fn transcode_and_verify(
        &self,
        path: &Path,
        temp: &Path,
        probed: &ProbeResult,
    ) -> Result<(), FailureReason> {
        let request = TranscodeRequest::new(path, temp, self.target);
        self.transcoder.transcode(&request).await?;

        let output = probe_blocking(temp.to_path_buf())
            .await
            .map_err(|e| FailureReason::verification(format!("output is unreadable: {e}")))?;

        if !output.format.matches_target(&self.target) {
            return Err(FailureReason::verification(format!(
                "output is {} instead of {}",
                output.format,
                self.target.descriptor()
            )));
        }
        if !output.is_clean() {
            return Err(FailureReason::verification(
                "output has no well-formed data chunk",
            ));
        }

        // Approximate source durations include unknown chunks, so only an
        // exact one is compared.
        if let (Some(before), Some(after)) = (probed.duration, output.duration_secs()) {
            let before_secs = before.seconds();
            if before.is_exact() && before_secs > 0.0 {
                let drift = (after - before_secs).abs() / before_secs;
                if drift > self.max_duration_drift {
                    return Err(FailureReason::verification(format!(
                        "duration changed from {:.3}s to {:.3}s",
                        before_secs, after
                    )));
                }
            }
        }

        Ok(())
    }

    async fn roll_back(
        &self,
        record: BackupRecord,
        temp: &Path,
        reason: FailureReason,
    ) -> ConversionOutcome {
        if let Err(e) = fs::remove_file(temp).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(temp = %temp.display(), error = %e, "could not remove temporary output");
            }
        }

        let path = record.original_path().to_path_buf();
        let backup = record.backup_path().to_path_buf();
        match self.ledger.restore(record).await {
            Ok(()) => {
                warn!(path = %path.display(), %reason, "conversion failed, original restored");
                ConversionOutcome::failed(reason)
            }
            Err(e) => {
                RESTORE_FAILURES.inc();
                error!(
                    target: ALARM_TARGET,
                    path = %path.display(),
                    backup = %backup.display(),
                    error = %e,
                    cause = %reason,
                    "restore failed, original may be lost"
                );
                ConversionOutcome::failed(FailureReason::RestoreFailed {
                    message: e.to_string(),
                    cause: reason.to_string(),
                })
            }
        }
    }
}

/// Converts a batch of files to the target encoding, one file at a time per
/// worker.
///
/// Each file is handled independently: probe, back up, transcode to a
/// temporary sibling, verify, swap, release. A failure anywhere after the
/// backup restores the original, so no file is ever left half-converted.
pub struct TranscodeOrchestrator<T: Transcoder> {
    config: BatchConfig,
    transcoder: Arc<T>,
    ledger: Arc<SafetyLedger>,
    semaphore: Arc<Semaphore>,
    cancel: CancelHandle,
}

impl<T: Transcoder + 'static> TranscodeOrchestrator<T> {
    /// Creates a new orchestrator.
    pub fn new(config: BatchConfig, transcoder: T, ledger: SafetyLedger) -> Self {
        Self::from_shared(config, Arc::new(transcoder), Arc::new(ledger))
    }

    /// Creates an orchestrator over an existing transcoder and ledger.
    pub fn from_shared(config: BatchConfig, transcoder: Arc<T>, ledger: Arc<SafetyLedger>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            config,
            transcoder,
            ledger,
            semaphore,
            cancel: CancelHandle::new(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn transcoder(&self) -> &Arc<T> {
        &self.transcoder
    }

    pub fn ledger(&self) -> &Arc<SafetyLedger> {
        &self.ledger
    }

    /// Handle that stops the batch before any further backup.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    async fn probe_many(&self, files: Vec<PathBuf>) -> Vec<(PathBuf, Result<ProbeResult, ProbeError>)> {
        let mut set = JoinSet::new();
        for path in files {
            let semaphore = Arc::clone(&self.semaphore);
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = probe_blocking(path.clone()).await;
                (path, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => error!(error = %e, "probe task failed"),
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// Probes every file without modifying anything.
    pub async fn probe_all(&self, files: &[PathBuf], target: &TargetFormat) -> ProbeSummary {
        let mut summary = ProbeSummary::default();

        for (path, result) in self.probe_many(sorted_unique(files)).await {
            match result {
                Ok(result) => {
                    let classification = result.classify(target);
                    FILES_PROBED
                        .with_label_values(&[classification_label(classification)])
                        .inc();
                    summary.files.push(ProbedFile {
                        path,
                        result,
                        classification,
                    });
                }
                Err(e) => {
                    FILES_PROBED.with_label_values(&[e.kind()]).inc();
                    debug!(path = %path.display(), error = %e, "unreadable file");
                    summary.unreadable.push(UnreadableFile::new(&path, &e));
                }
            }
        }

        info!(
            files = summary.files.len(),
            unreadable = summary.unreadable.len(),
            canonical = summary.count(Classification::Canonical),
            convertible = summary.count(Classification::Convertible),
            needs_review = summary.count(Classification::NeedsReview),
            "probe finished"
        );
        summary
    }

    /// Converts every non-canonical file in `files` to `target`.
    ///
    /// Never fails as a whole: per-file problems are recorded in the report.
    /// Duplicate paths are processed once.
    pub async fn convert_batch(&self, files: &[PathBuf], target: &TargetFormat) -> BatchReport {
        let started_at = Utc::now();
        let files = sorted_unique(files);
        info!(
            files = files.len(),
            target = %target.descriptor(),
            workers = self.config.max_workers,
            transcoder = self.transcoder.name(),
            "starting batch"
        );

        let worker = Worker {
            transcoder: Arc::clone(&self.transcoder),
            ledger: Arc::clone(&self.ledger),
            target: *target,
            max_duration_drift: self.config.max_duration_drift,
            cancel: self.cancel.clone(),
        };

        let mut entries = Vec::with_capacity(files.len());
        let mut alarms = Vec::new();
        let mut next = 0;

        if self.config.trial_first {
            while next < files.len() {
                let entry = worker.process(&files[next]).await;
                next += 1;
                let attempted = entry.attempted_conversion();
                let failed = entry.is_failed();
                entries.push(entry);
                if !attempted {
                    continue;
                }
                if failed {
                    warn!(path = %files[next - 1].display(), "trial conversion failed, skipping the rest of the batch");
                    entries.extend(
                        files[next..]
                            .iter()
                            .map(|p| FileEntry::skipped(p, SkipReason::TrialFailed)),
                    );
                    next = files.len();
                } else {
                    info!(path = %files[next - 1].display(), "trial conversion succeeded");
                }
                break;
            }
        }

        let mut set = JoinSet::new();
        let mut paths_by_task = HashMap::new();
        for path in &files[next..] {
            let worker = worker.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let task_path = path.clone();
            let handle = set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return FileEntry::skipped(&task_path, SkipReason::Cancelled);
                };
                worker.process(&task_path).await
            });
            paths_by_task.insert(handle.id(), path.clone());
        }

        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, entry)) => entries.push(entry),
                Err(e) => {
                    let path = paths_by_task.remove(&e.id()).unwrap_or_default();
                    error!(
                        target: ALARM_TARGET,
                        path = %path.display(),
                        error = %e,
                        "worker died; any leftover backup can be recovered with `wavforge restore`"
                    );
                    alarms.push(Alarm {
                        path,
                        message: format!("worker died: {e}"),
                    });
                }
            }
        }

        let mut report = BatchReport {
            started_at,
            finished_at: started_at,
            target: *target,
            counts: BatchCounts::default(),
            outcomes: Vec::new(),
            unreadable: Vec::new(),
            needs_review: Vec::new(),
            skipped: Vec::new(),
            alarms,
            post_verify_failures: Vec::new(),
            stale_backups: Vec::new(),
        };

        for entry in entries {
            match entry {
                FileEntry::Outcome(outcome, stale) => {
                    if let Some(reason) = outcome.outcome.failure().filter(|r| r.is_alarm()) {
                        report.alarms.push(Alarm {
                            path: outcome.path.clone(),
                            message: reason.to_string(),
                        });
                    }
                    report.stale_backups.extend(stale);
                    report.outcomes.push(outcome);
                }
                FileEntry::Unreadable(u) => report.unreadable.push(u),
                FileEntry::NeedsReview(r) => report.needs_review.push(r),
                FileEntry::Skipped(s) => report.skipped.push(s),
            }
        }

        report.outcomes.sort_by(|a, b| a.path.cmp(&b.path));
        report.unreadable.sort_by(|a, b| a.path.cmp(&b.path));
        report.needs_review.sort_by(|a, b| a.path.cmp(&b.path));
        report.skipped.sort_by(|a, b| a.path.cmp(&b.path));
        report.alarms.sort_by(|a, b| a.path.cmp(&b.path));
        report.stale_backups.sort_by(|a, b| a.path.cmp(&b.path));

        report.post_verify_failures = self.verify_converted(&report, target).await;
        report.compute_counts();
        report.finished_at = Utc::now();

        let counts = report.counts;
        info!(
            probed = counts.probed,
            canonical = counts.canonical,
            converted = counts.converted,
            failed = counts.failed,
            unreadable = counts.unreadable,
            needs_review = counts.needs_review,
            skipped = counts.skipped,
            "batch finished"
        );
        if report.has_alarms() {
            error!(
                target: ALARM_TARGET,
                alarms = report.alarms.len(),
                "batch finished with alarms, originals may be lost"
            );
        }
        report
    }

    /// Re-probes every converted file.
    async fn verify_converted(
        &self,
        report: &BatchReport,
        target: &TargetFormat,
    ) -> Vec<PostVerifyFailure> {
        let converted: Vec<PathBuf> = report
            .outcomes
            .iter()
            .filter(|o| o.outcome == ConversionOutcome::Converted)
            .map(|o| o.path.clone())
            .collect();

        let mut failures = Vec::new();
        for (path, result) in self.probe_many(converted).await {
            let reason = match result {
                Err(e) => Some(format!("unreadable after conversion: {e}")),
                Ok(r) if !r.format.matches_target(target) => {
                    Some(format!("format is {} after conversion", r.format))
                }
                Ok(r) if !r.is_clean() => Some("no well-formed data chunk after conversion".to_string()),
                Ok(_) => None,
            };
            if let Some(reason) = reason {
                error!(path = %path.display(), %reason, "post-conversion verification failed");
                failures.push(PostVerifyFailure { path, reason });
            }
        }
        failures
    }
}
