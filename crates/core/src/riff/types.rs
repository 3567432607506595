//! Types for the RIFF chunk walker.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ProbeError;

/// Size of the outer `RIFF <size> WAVE` header.
pub const RIFF_HEADER_LEN: u64 = 12;

/// Size of a chunk header (tag + length).
pub const CHUNK_HEADER_LEN: u64 = 8;

/// A four-character chunk identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const RIFF: FourCc = FourCc(*b"RIFF");
    pub const WAVE: FourCc = FourCc(*b"WAVE");
    pub const FMT: FourCc = FourCc(*b"fmt ");
    pub const DATA: FourCc = FourCc(*b"data");
    pub const LIST: FourCc = FourCc(*b"LIST");

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc(\"{}\")", self)
    }
}

/// Header of a single chunk within the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Chunk identifier.
    pub tag: FourCc,
    /// Declared payload length in bytes (excluding the pad byte).
    pub size: u32,
    /// Absolute offset of the chunk header in the stream.
    pub offset: u64,
}

impl ChunkHeader {
    /// Absolute offset of the first payload byte.
    pub fn payload_offset(&self) -> u64 {
        self.offset + CHUNK_HEADER_LEN
    }

    /// Payload length including the word-alignment pad byte.
    pub fn padded_size(&self) -> u64 {
        let size = self.size as u64;
        size + (size & 1)
    }
}

/// A structural defect found after the format chunk was already parsed.
///
/// The probe still yields a result for such files, but carries the anomaly
/// so callers can treat the file as suspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamAnomaly {
    /// The stream ended in the middle of a chunk header.
    Truncated { offset: u64, remaining: u64 },
    /// A chunk declared more bytes than the file holds.
    OversizedChunk {
        tag: String,
        offset: u64,
        declared: u32,
        remaining: u64,
    },
}

impl StreamAnomaly {
    /// Converts a walker error into an anomaly, if it is one.
    pub fn from_error(err: &ProbeError) -> Option<Self> {
        match err {
            ProbeError::TruncatedStream {
                offset, remaining, ..
            } => Some(Self::Truncated {
                offset: *offset,
                remaining: *remaining,
            }),
            ProbeError::OversizedChunk {
                tag,
                offset,
                declared,
                remaining,
            } => Some(Self::OversizedChunk {
                tag: tag.to_string(),
                offset: *offset,
                declared: *declared,
                remaining: *remaining,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for StreamAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { offset, remaining } => write!(
                f,
                "truncated at offset {} ({} trailing bytes)",
                offset, remaining
            ),
            Self::OversizedChunk {
                tag,
                offset,
                declared,
                remaining,
            } => write!(
                f,
                "chunk '{}' at offset {} declares {} bytes, {} remain",
                tag, offset, declared, remaining
            ),
        }
    }
}
