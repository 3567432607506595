//! End-to-end tests of the `wavforge` binary.
//!
//! Conversions run through a shell script standing in for ffmpeg, so these
//! exercise argument parsing, config loading, output and exit codes without
//! any external tool.

mod common;

use common::{fixtures::WavBuilder, read, TestFixture};
use wavforge_core::{probe_path, Classification, TargetFormat};

#[test]
fn test_probe_lists_files_and_counts() {
    let fixture = TestFixture::new();
    fixture.write("a.wav", WavBuilder::canonical(&TargetFormat::default()).with_seconds(1.0));
    fixture.write("b.wav", WavBuilder::float32(2, 44100).with_seconds(0.5));

    let output = fixture.run_on_corpus(&["probe"]);

    assert_eq!(output.code, Some(0), "stderr: {}", output.stderr);
    assert!(output.stdout.contains("a.wav  pcm 1ch 22050Hz 16bit  1.000s  canonical"));
    assert!(output.stdout.contains("b.wav  ieee_float 2ch 44100Hz 32bit  0.500s  convertible"));
    assert!(output
        .stdout
        .contains("2 files: 1 canonical, 1 convertible, 0 needs review, 0 unreadable"));
}

#[test]
fn test_probe_json_and_unreadable_exit_code() {
    let fixture = TestFixture::new();
    fixture.write("a.wav", WavBuilder::pcm16(1, 16000).with_seconds(0.25));
    std::fs::write(fixture.corpus().join("junk.wav"), b"not a wav").unwrap();

    let output = fixture.run_on_corpus(&["probe", "--json"]);

    assert_eq!(output.code, Some(1));
    let json = output.json();
    assert_eq!(json["files"].as_array().unwrap().len(), 1);
    assert_eq!(json["files"][0]["classification"], "convertible");
    assert_eq!(json["unreadable"][0]["kind"], "not_a_container");
}

#[test]
fn test_dry_run_changes_nothing() {
    let fixture = TestFixture::new();
    let path = fixture.write("a.wav", WavBuilder::float32(1, 22050).with_seconds(0.2));
    let before = read(&path);

    let output = fixture.run_on_corpus(&["convert", "--dry-run"]);

    assert_eq!(output.code, Some(0), "stderr: {}", output.stderr);
    assert!(output.stdout.contains("convertible"));
    assert_eq!(read(&path), before);
    assert!(!fixture.backup_dir().exists());
}

#[test]
fn test_convert_refuses_without_ffmpeg() {
    let fixture = TestFixture::new();
    let path = fixture.write("a.wav", WavBuilder::float32(1, 22050).with_seconds(0.2));
    let before = read(&path);

    let output = fixture.run_on_corpus(&["convert"]);

    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("ffmpeg is not usable"));
    assert_eq!(read(&path), before);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut fixture = TestFixture::new();
    fixture.extra_config = "[batch]\nmax_workers = 0\n".to_string();

    let output = fixture.run(&["check"]);

    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Configuration validation failed"));
}

#[test]
fn test_restore_with_nothing_to_do() {
    let fixture = TestFixture::new();

    let output = fixture.run(&["restore"]);

    assert_eq!(output.code, Some(0), "stderr: {}", output.stderr);
    assert!(output.stdout.contains("0 restored, 0 failed, 0 orphaned backups"));
}

#[cfg(unix)]
#[test]
fn test_convert_through_fake_ffmpeg() {
    let target = TargetFormat::default();
    let mut fixture = TestFixture::new();
    let prepared = WavBuilder::canonical(&target)
        .with_seconds(0.5)
        .write_to(fixture.dir.path(), "prepared.wav")
        .unwrap();
    fixture.fake_ffmpeg(&format!("cp '{}' \"$last\"", prepared.display()));
    let canonical = fixture.write("a.wav", WavBuilder::canonical(&target).with_seconds(0.5));
    let float = fixture.write("b.wav", WavBuilder::float32(2, 48000).with_seconds(0.5));
    let canonical_before = read(&canonical);

    let output = fixture.run_on_corpus(&["convert", "--json", "--workers", "2"]);

    assert_eq!(output.code, Some(0), "stderr: {}", output.stderr);
    let json = output.json();
    assert_eq!(json["counts"]["converted"], 1);
    assert_eq!(json["counts"]["canonical"], 1);
    assert_eq!(json["outcomes"][1]["status"], "converted");
    assert_eq!(read(&canonical), canonical_before);
    let after = probe_path(&float).unwrap();
    assert_eq!(after.classify(&target), Classification::Canonical);
}

#[cfg(unix)]
#[test]
fn test_failing_ffmpeg_restores_and_exits_one() {
    let mut fixture = TestFixture::new();
    fixture.fake_ffmpeg("printf 'RIFF' > \"$last\"\necho 'Conversion failed!' >&2\nexit 1");
    let path = fixture.write("a.wav", WavBuilder::float32(1, 22050).with_seconds(0.2));
    let before = read(&path);

    let output = fixture.run_on_corpus(&["convert", "--metrics"]);

    assert_eq!(output.code, Some(1));
    assert!(output.stdout.contains("FAILED     "));
    assert!(output.stdout.contains("Conversion failed!"));
    assert!(output
        .stdout
        .contains("wavforge_conversions_total{outcome=\"tool_invocation_failed\"} 1"));
    assert_eq!(read(&path), before);
}

#[cfg(unix)]
#[test]
fn test_trial_failure_skips_remaining_files() {
    let mut fixture = TestFixture::new();
    fixture.fake_ffmpeg("exit 3");
    let first = fixture.write("a.wav", WavBuilder::float32(1, 22050).with_seconds(0.2));
    let second = fixture.write("b.wav", WavBuilder::float32(1, 22050).with_seconds(0.2));
    let before = [read(&first), read(&second)];

    let output = fixture.run_on_corpus(&["convert", "--trial-first", "--json"]);

    assert_eq!(output.code, Some(1));
    let json = output.json();
    assert_eq!(json["counts"]["failed"], 1);
    assert_eq!(json["skipped"][0]["reason"], "trial_failed");
    assert_eq!([read(&first), read(&second)], before);
}
