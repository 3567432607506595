//! Error types for container parsing.

use thiserror::Error;

use super::types::FourCc;

/// Errors that can occur while walking or probing a container.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The outer RIFF/WAVE magic is missing or wrong.
    #[error("Not a RIFF/WAVE container: {reason}")]
    NotAContainer { reason: String },

    /// Fewer bytes remain than a header or fixed structure requires.
    #[error("Stream truncated at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedStream {
        offset: u64,
        needed: u64,
        remaining: u64,
    },

    /// A chunk declares a payload that would read past end-of-file.
    #[error("Chunk '{tag}' at offset {offset} declares {declared} bytes but only {remaining} remain")]
    OversizedChunk {
        tag: FourCc,
        offset: u64,
        declared: u32,
        remaining: u64,
    },

    /// The stream ended without a `fmt ` chunk.
    #[error("No format chunk found")]
    MissingFormatChunk,

    /// The encoding tag cannot be converted automatically.
    #[error("Unsupported encoding tag {tag:#06x}, manual review required")]
    UnsupportedEncoding { tag: u16 },

    /// I/O error while reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Creates a not-a-container error.
    pub fn not_a_container(reason: impl Into<String>) -> Self {
        Self::NotAContainer {
            reason: reason.into(),
        }
    }

    /// Whether this error describes the file structure (as opposed to I/O).
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::Io(_))
    }

    /// Short label used for metrics and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAContainer { .. } => "not_a_container",
            Self::TruncatedStream { .. } => "truncated_stream",
            Self::OversizedChunk { .. } => "oversized_chunk",
            Self::MissingFormatChunk => "missing_format_chunk",
            Self::UnsupportedEncoding { .. } => "unsupported_encoding",
            Self::Io(_) => "io",
        }
    }
}
