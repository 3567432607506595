//! Common test utilities for end-to-end CLI tests.
//!
//! [`TestFixture`] owns a scratch directory with a corpus, a backup
//! directory and a `wavforge.toml`, and runs the real `wavforge` binary
//! against them.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Re-export fixtures for test convenience
pub use wavforge_core::testing::fixtures;

use fixtures::WavBuilder;

/// Captured result of one CLI invocation.
pub struct CliOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.stdout).expect("stdout is not JSON")
    }
}

pub struct TestFixture {
    pub dir: TempDir,
    /// `[transcoder] ffmpeg_path` written to the config.
    pub ffmpeg_path: PathBuf,
    /// Extra TOML appended to the generated config.
    pub extra_config: String,
}

impl TestFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir(dir.path().join("corpus")).expect("Failed to create corpus dir");
        let ffmpeg_path = dir.path().join("no-such-ffmpeg");
        Self {
            dir,
            ffmpeg_path,
            extra_config: String::new(),
        }
    }

    pub fn corpus(&self) -> PathBuf {
        self.dir.path().join("corpus")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.path().join("backups")
    }

    pub fn write(&self, name: &str, builder: WavBuilder) -> PathBuf {
        builder
            .write_to(&self.corpus(), name)
            .expect("Failed to write fixture")
    }

    /// Installs an executable script as the ffmpeg binary. `-version`
    /// always succeeds; every other call runs `body`.
    #[cfg(unix)]
    pub fn fake_ffmpeg(&mut self, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = self.dir.path().join("fake-ffmpeg");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then echo 'ffmpeg version fake'; exit 0; fi\nfor last; do :; done\n{body}\n"
        );
        std::fs::write(&path, script).expect("Failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod script");
        self.ffmpeg_path = path;
    }

    fn config_path(&self) -> PathBuf {
        let path = self.dir.path().join("wavforge.toml");
        let toml = format!(
            "[transcoder]\nffmpeg_path = \"{}\"\ntimeout_secs = 5\n\n[ledger]\nbackup_dir = \"{}\"\n\n{}",
            self.ffmpeg_path.display(),
            self.backup_dir().display(),
            self.extra_config
        );
        std::fs::write(&path, toml).expect("Failed to write config");
        path
    }

    pub fn run(&self, args: &[&str]) -> CliOutput {
        let config = self.config_path();
        let output = Command::new(env!("CARGO_BIN_EXE_wavforge"))
            .arg("--config")
            .arg(&config)
            .args(args)
            .current_dir(self.dir.path())
            .env_remove("WAVFORGE_CONFIG")
            .env("RUST_LOG", "warn")
            .output()
            .expect("Failed to run wavforge");

        CliOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    pub fn run_on_corpus(&self, args: &[&str]) -> CliOutput {
        let corpus = self.corpus();
        let mut all: Vec<&str> = args.to_vec();
        all.push(corpus.to_str().expect("temp path is not UTF-8"));
        self.run(&all)
    }
}

pub fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).expect("Failed to read file")
}
