//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the external transcoder.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Transcoder binary not found.
    #[error("Transcoder not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// The transcoder ran but did not succeed.
    #[error("Transcoder failed: {reason}")]
    ToolInvocationFailed {
        reason: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    /// The transcoder exceeded its time budget and was killed.
    #[error("Transcoder timed out after {timeout_secs} seconds")]
    ToolTimeout { timeout_secs: u64 },

    /// The target encoding cannot be expressed as transcoder arguments.
    #[error("Unsupported target: {reason}")]
    UnsupportedTarget { reason: String },

    /// I/O error around the transcoder process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Creates an invocation failure carrying the exit code and captured stderr.
    pub fn invocation_failed(
        reason: impl Into<String>,
        exit_code: Option<i32>,
        stderr: Option<String>,
    ) -> Self {
        Self::ToolInvocationFailed {
            reason: reason.into(),
            exit_code,
            stderr,
        }
    }

    /// Creates an unsupported target error.
    pub fn unsupported_target(reason: impl Into<String>) -> Self {
        Self::UnsupportedTarget {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ToolTimeout { .. } | Self::Io(_))
    }
}
