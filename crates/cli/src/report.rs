//! Human-readable rendering of probe, batch and recovery results.

use std::io::{self, Write};
use std::path::Path;

use wavforge_core::{
    batch::ProbedFile, BatchReport, Classification, ConversionOutcome, ProbeSummary,
    RecoveryReport,
};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURES: u8 = 1;
pub const EXIT_ALARM: u8 = 2;

fn classification_label(classification: Classification) -> &'static str {
    match classification {
        Classification::Canonical => "canonical",
        Classification::Convertible => "convertible",
        Classification::NeedsReview => "needs review",
    }
}

fn write_probed(out: &mut impl Write, file: &ProbedFile) -> io::Result<()> {
    let duration = file
        .result
        .duration
        .map(|d| d.to_string())
        .unwrap_or_else(|| "?".to_string());
    write!(
        out,
        "{}  {}  {}  {}",
        file.path.display(),
        file.result.format,
        duration,
        classification_label(file.classification)
    )?;
    if let Some(anomaly) = &file.result.anomaly {
        write!(out, "  [{anomaly}]")?;
    }
    writeln!(out)
}

/// Per-file lines, then the partition counts. Approximate durations carry
/// a `~` prefix.
pub fn write_probe_summary(out: &mut impl Write, summary: &ProbeSummary) -> io::Result<()> {
    for file in &summary.files {
        write_probed(out, file)?;
    }
    for file in &summary.unreadable {
        writeln!(
            out,
            "{}  unreadable ({}): {}",
            file.path.display(),
            file.kind,
            file.reason
        )?;
    }
    writeln!(
        out,
        "{} files: {} canonical, {} convertible, {} needs review, {} unreadable",
        summary.files.len() + summary.unreadable.len(),
        summary.count(Classification::Canonical),
        summary.count(Classification::Convertible),
        summary.count(Classification::NeedsReview),
        summary.unreadable.len()
    )
}

/// Lists everything that was not left unchanged, then the counts.
pub fn write_batch_report(out: &mut impl Write, report: &BatchReport) -> io::Result<()> {
    for outcome in &report.outcomes {
        match &outcome.outcome {
            ConversionOutcome::Unchanged => {}
            ConversionOutcome::Converted => writeln!(
                out,
                "converted  {}  (was {})",
                outcome.path.display(),
                outcome.source_format
            )?,
            ConversionOutcome::Failed { reason } => {
                writeln!(out, "FAILED     {}  {}", outcome.path.display(), reason)?
            }
        }
    }
    for file in &report.unreadable {
        writeln!(out, "unreadable {}  {}", file.path.display(), file.reason)?;
    }
    for item in &report.needs_review {
        writeln!(out, "review     {}  {}", item.path.display(), item.format)?;
    }
    for file in &report.skipped {
        writeln!(out, "skipped    {}  ({:?})", file.path.display(), file.reason)?;
    }
    for stale in &report.stale_backups {
        writeln!(
            out,
            "STALE      {}  {} (delete it before `wavforge restore`)",
            stale.path.display(),
            stale.message
        )?;
    }
    for failure in &report.post_verify_failures {
        writeln!(
            out,
            "VERIFY     {}  {}",
            failure.path.display(),
            failure.reason
        )?;
    }

    let counts = report.counts;
    let elapsed = report.finished_at - report.started_at;
    writeln!(
        out,
        "{} probed: {} unchanged, {} converted, {} failed, {} unreadable, {} needs review, {} skipped ({:.1}s)",
        counts.probed,
        counts.canonical,
        counts.converted,
        counts.failed,
        counts.unreadable,
        counts.needs_review,
        counts.skipped,
        elapsed.num_milliseconds() as f64 / 1000.0
    )
}

pub fn write_recovery_report(out: &mut impl Write, report: &RecoveryReport) -> io::Result<()> {
    for path in &report.restored {
        writeln!(out, "restored   {}", path.display())?;
    }
    for failure in &report.failed {
        let original = failure
            .original_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown original>".to_string());
        writeln!(
            out,
            "FAILED     {}  (manifest {}): {}",
            original,
            failure.manifest_path.display(),
            failure.reason
        )?;
    }
    for orphan in &report.orphans {
        writeln!(out, "orphan     {}", orphan.display())?;
    }
    writeln!(
        out,
        "{} restored, {} failed, {} orphaned backups",
        report.restored.len(),
        report.failed.len(),
        report.orphans.len()
    )
}

/// Banner for stderr when an original may be lost.
pub fn alarm_banner(report: &BatchReport, backup_dir: &Path) -> Option<String> {
    if !report.has_alarms() {
        return None;
    }
    let rule = "!".repeat(72);
    let mut banner = format!(
        "{rule}\n!! {} file(s) could not be restored. Originals may be lost.\n",
        report.alarms.len()
    );
    for alarm in &report.alarms {
        banner.push_str(&format!("!!   {}: {}\n", alarm.path.display(), alarm.message));
    }
    banner.push_str(&format!(
        "!! Backups are kept in {}. Do not delete them.\n{rule}",
        backup_dir.display()
    ));
    Some(banner)
}

/// 2 on any alarm, 1 if any file did not end up canonical or reviewed or
/// left a stale backup, 0 otherwise.
pub fn batch_exit_status(report: &BatchReport) -> u8 {
    if report.has_alarms() {
        EXIT_ALARM
    } else if !report.is_clean() || !report.skipped.is_empty() {
        EXIT_FAILURES
    } else {
        EXIT_OK
    }
}

pub fn probe_exit_status(summary: &ProbeSummary) -> u8 {
    if summary.unreadable.is_empty() {
        EXIT_OK
    } else {
        EXIT_FAILURES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use wavforge_core::batch::{Alarm, BatchCounts, FileOutcome, StaleBackup};
    use wavforge_core::{FailureReason, TargetFormat};

    fn report(outcomes: Vec<(&str, ConversionOutcome)>) -> BatchReport {
        let target = TargetFormat::default();
        let now = Utc::now();
        let mut counts = BatchCounts::default();
        let outcomes: Vec<FileOutcome> = outcomes
            .into_iter()
            .map(|(path, outcome)| {
                match outcome {
                    ConversionOutcome::Unchanged => counts.canonical += 1,
                    ConversionOutcome::Converted => counts.converted += 1,
                    ConversionOutcome::Failed { .. } => counts.failed += 1,
                }
                FileOutcome {
                    path: PathBuf::from(path),
                    source_format: target.descriptor(),
                    outcome,
                }
            })
            .collect();
        counts.probed = outcomes.len();
        BatchReport {
            started_at: now,
            finished_at: now,
            target,
            counts,
            outcomes,
            unreadable: Vec::new(),
            needs_review: Vec::new(),
            skipped: Vec::new(),
            alarms: Vec::new(),
            post_verify_failures: Vec::new(),
            stale_backups: Vec::new(),
        }
    }

    fn render(report: &BatchReport) -> String {
        let mut out = Vec::new();
        write_batch_report(&mut out, report).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_clean_batch_exits_zero() {
        let report = report(vec![
            ("a.wav", ConversionOutcome::Unchanged),
            ("b.wav", ConversionOutcome::Converted),
        ]);
        assert_eq!(batch_exit_status(&report), EXIT_OK);
        assert!(alarm_banner(&report, Path::new("backups")).is_none());

        let text = render(&report);
        assert!(!text.contains("a.wav"));
        assert!(text.contains("converted  b.wav"));
        assert!(text.contains("2 probed: 1 unchanged, 1 converted, 0 failed"));
    }

    #[test]
    fn test_failed_file_exits_one() {
        let report = report(vec![(
            "a.wav",
            ConversionOutcome::failed(FailureReason::ToolTimeout { timeout_secs: 5 }),
        )]);
        assert_eq!(batch_exit_status(&report), EXIT_FAILURES);
        assert!(render(&report).contains("FAILED     a.wav  transcoder timed out after 5s"));
    }

    #[test]
    fn test_stale_backup_is_listed_and_exits_one() {
        let mut report = report(vec![("a.wav", ConversionOutcome::Converted)]);
        report.stale_backups.push(StaleBackup {
            path: PathBuf::from("a.wav"),
            message: "Failed to release backup /b/x-a.wav.json".to_string(),
        });

        assert_eq!(batch_exit_status(&report), EXIT_FAILURES);
        assert!(alarm_banner(&report, Path::new("backups")).is_none());
        assert!(render(&report).contains("STALE      a.wav  Failed to release backup /b/x-a.wav.json"));
    }

    #[test]
    fn test_alarm_exits_two_with_banner() {
        let mut report = report(vec![(
            "a.wav",
            ConversionOutcome::failed(FailureReason::RestoreFailed {
                message: "backup missing".to_string(),
                cause: "transcoder failed".to_string(),
            }),
        )]);
        report.alarms.push(Alarm {
            path: PathBuf::from("a.wav"),
            message: "restore failed".to_string(),
        });

        assert_eq!(batch_exit_status(&report), EXIT_ALARM);
        let banner = alarm_banner(&report, Path::new("/var/backups")).unwrap();
        assert!(banner.contains("1 file(s) could not be restored"));
        assert!(banner.contains("a.wav: restore failed"));
        assert!(banner.contains("/var/backups"));
    }

    #[test]
    fn test_recovery_report_lines() {
        let report = RecoveryReport {
            restored: vec![PathBuf::from("/corpus/a.wav")],
            failed: Vec::new(),
            orphans: vec![PathBuf::from("/backups/x-b.wav")],
        };
        let mut out = Vec::new();
        write_recovery_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("restored   /corpus/a.wav"));
        assert!(text.contains("orphan     /backups/x-b.wav"));
        assert!(text.contains("1 restored, 0 failed, 1 orphaned backups"));
    }
}
