//! Request and result types for transcoding.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::probe::TargetFormat;

/// One file to re-encode.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub input_path: PathBuf,
    /// Where the new file is written. Never the input path.
    pub output_path: PathBuf,
    pub target: TargetFormat,
}

impl TranscodeRequest {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        target: TargetFormat,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            target,
        }
    }
}

/// Result of a successful tool run.
///
/// Success only means the tool exited cleanly; the output still has to be
/// checked by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeOutput {
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    pub duration_ms: u64,
}
