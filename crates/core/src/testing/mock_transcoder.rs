//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::fixtures::WavBuilder;
use crate::probe::{probe_path, TargetFormat};
use crate::transcoder::{TranscodeError, TranscodeOutput, TranscodeRequest, Transcoder};

/// What the mock does for a given input.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MockBehavior {
    /// Write a canonical file with the input's duration.
    #[default]
    Succeed,
    /// Write half a header, then exit non-zero.
    Fail { exit_code: i32 },
    /// Write half a header, then report a timeout.
    Timeout,
    /// Exit cleanly after writing bytes that are not a container.
    WriteGarbage,
    /// Exit cleanly after writing a WAV in another format.
    WriteFormat(TargetFormat),
    /// Exit cleanly after writing a canonical file of this many seconds.
    WriteDuration(f64),
    /// Delete the input, then exit non-zero.
    DeleteInput,
    /// Delete this backup directory, then exit non-zero.
    DestroyBackups(PathBuf),
    /// Succeed, after swapping every manifest in this backup directory for
    /// a non-empty directory that cannot be removed as a file.
    PinManifests(PathBuf),
}

/// A recorded transcode request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTranscode {
    pub request: TranscodeRequest,
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Behaviour is chosen per input path, falling back to a default. Outputs are
/// real WAV files built with [`WavBuilder`], so the orchestrator's
/// verification runs against them unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use wavforge_core::testing::{MockBehavior, MockTranscoder};
///
/// let transcoder = MockTranscoder::new();
/// transcoder.set_behavior(&path, MockBehavior::Fail { exit_code: 1 }).await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTranscoder {
    recorded: Arc<RwLock<Vec<RecordedTranscode>>>,
    behaviors: Arc<RwLock<HashMap<PathBuf, MockBehavior>>>,
    default_behavior: Arc<RwLock<MockBehavior>>,
    delay: Arc<RwLock<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockTranscoder {
    /// Create a mock that succeeds for every file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the behaviour for one input path.
    pub async fn set_behavior(&self, path: impl AsRef<Path>, behavior: MockBehavior) {
        self.behaviors
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), behavior);
    }

    /// Set the behaviour for inputs without their own.
    pub async fn set_default_behavior(&self, behavior: MockBehavior) {
        *self.default_behavior.write().await = behavior;
    }

    /// Simulated time spent per file.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Get all recorded requests.
    pub async fn recorded(&self) -> Vec<RecordedTranscode> {
        self.recorded.read().await.clone()
    }

    /// Get the number of requests received.
    pub async fn call_count(&self) -> usize {
        self.recorded.read().await.len()
    }

    /// Highest number of requests that ran at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn behavior_for(&self, path: &Path) -> MockBehavior {
        match self.behaviors.read().await.get(path) {
            Some(behavior) => behavior.clone(),
            None => self.default_behavior.read().await.clone(),
        }
    }

    async fn run(
        &self,
        request: &TranscodeRequest,
        behavior: MockBehavior,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let partial = || tokio::fs::write(&request.output_path, b"RIFF\x00\x00");
        let failed = |exit_code: i32| {
            TranscodeError::invocation_failed(
                format!("mock exited with code {exit_code}"),
                Some(exit_code),
                Some("simulated failure".to_string()),
            )
        };

        let faithful = || {
            let seconds = probe_path(&request.input_path)
                .ok()
                .and_then(|r| r.duration_secs())
                .unwrap_or(1.0);
            WavBuilder::canonical(&request.target)
                .with_seconds(seconds)
                .build()
        };

        let bytes = match behavior {
            MockBehavior::Succeed => faithful(),
            MockBehavior::Fail { exit_code } => {
                partial().await?;
                return Err(failed(exit_code));
            }
            MockBehavior::Timeout => {
                partial().await?;
                return Err(TranscodeError::ToolTimeout { timeout_secs: 1 });
            }
            MockBehavior::WriteGarbage => b"this is not a wav file".to_vec(),
            MockBehavior::WriteFormat(format) => {
                WavBuilder::canonical(&format).with_seconds(1.0).build()
            }
            MockBehavior::WriteDuration(seconds) => WavBuilder::canonical(&request.target)
                .with_seconds(seconds)
                .build(),
            MockBehavior::DeleteInput => {
                tokio::fs::remove_file(&request.input_path).await?;
                return Err(failed(1));
            }
            MockBehavior::DestroyBackups(dir) => {
                tokio::fs::remove_dir_all(&dir).await?;
                return Err(failed(1));
            }
            MockBehavior::PinManifests(dir) => {
                let mut entries = tokio::fs::read_dir(&dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let manifest = entry.path();
                    if manifest.extension().is_some_and(|ext| ext == "json") {
                        tokio::fs::remove_file(&manifest).await?;
                        tokio::fs::create_dir(&manifest).await?;
                        tokio::fs::write(manifest.join("pinned"), b"").await?;
                    }
                }
                faithful()
            }
        };

        tokio::fs::write(&request.output_path, &bytes).await?;
        Ok(TranscodeOutput {
            output_path: request.output_path.clone(),
            output_size_bytes: bytes.len() as u64,
            duration_ms: delay.as_millis() as u64,
        })
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcode(
        &self,
        request: &TranscodeRequest,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let behavior = self.behavior_for(&request.input_path).await;
        let result = self.run(request, behavior).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.recorded.write().await.push(RecordedTranscode {
            request: request.clone(),
            success: result.is_ok(),
        });
        result
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}
