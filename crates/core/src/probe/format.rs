//! Format descriptors and encoding classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::riff::ProbeError;

/// Length of the fixed part of a `fmt ` chunk.
pub const FORMAT_CHUNK_LEN: usize = 16;

/// Sample encoding declared by the format chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tag", rename_all = "snake_case")]
pub enum Encoding {
    /// Integer PCM (tag 1), the canonical encoding.
    Pcm,
    /// IEEE floating point (tag 3), converted automatically.
    IeeeFloat,
    /// Anything else; left for manual review.
    Other(u16),
}

impl Encoding {
    pub const PCM_TAG: u16 = 0x0001;
    pub const IEEE_FLOAT_TAG: u16 = 0x0003;

    /// Classifies a raw format tag.
    pub fn from_tag(tag: u16) -> Self {
        match tag {
            Self::PCM_TAG => Self::Pcm,
            Self::IEEE_FLOAT_TAG => Self::IeeeFloat,
            other => Self::Other(other),
        }
    }

    /// Returns the raw format tag.
    pub fn tag(&self) -> u16 {
        match self {
            Self::Pcm => Self::PCM_TAG,
            Self::IeeeFloat => Self::IEEE_FLOAT_TAG,
            Self::Other(tag) => *tag,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcm => write!(f, "pcm"),
            Self::IeeeFloat => write!(f, "ieee_float"),
            Self::Other(tag) => write!(f, "other({:#06x})", tag),
        }
    }
}

/// Codec parameters parsed from a `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub encoding: Encoding,
    pub channels: u16,
    pub sample_rate_hz: u32,
    /// Average bytes per second as declared by the file.
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FormatDescriptor {
    /// Parses the fixed 16-byte structure. `offset` is the payload position,
    /// used for error reporting.
    pub fn from_bytes(data: &[u8], offset: u64) -> Result<Self, ProbeError> {
        if data.len() < FORMAT_CHUNK_LEN {
            return Err(ProbeError::TruncatedStream {
                offset,
                needed: FORMAT_CHUNK_LEN as u64,
                remaining: data.len() as u64,
            });
        }

        Ok(Self {
            encoding: Encoding::from_tag(u16::from_le_bytes([data[0], data[1]])),
            channels: u16::from_le_bytes([data[2], data[3]]),
            sample_rate_hz: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            byte_rate: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            block_align: u16::from_le_bytes([data[12], data[13]]),
            bits_per_sample: u16::from_le_bytes([data[14], data[15]]),
        })
    }

    /// Serializes back into the fixed 16-byte structure.
    pub fn to_bytes(&self) -> [u8; FORMAT_CHUNK_LEN] {
        let mut out = [0u8; FORMAT_CHUNK_LEN];
        out[0..2].copy_from_slice(&self.encoding.tag().to_le_bytes());
        out[2..4].copy_from_slice(&self.channels.to_le_bytes());
        out[4..8].copy_from_slice(&self.sample_rate_hz.to_le_bytes());
        out[8..12].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[12..14].copy_from_slice(&self.block_align.to_le_bytes());
        out[14..16].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out
    }

    /// Whole bytes per sample (bits rounded down).
    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Whether block align and byte rate agree with the other fields.
    pub fn is_consistent(&self) -> bool {
        let block_align = self.channels as u32 * self.bytes_per_sample() as u32;
        block_align == self.block_align as u32
            && self.sample_rate_hz as u64 * block_align as u64 == self.byte_rate as u64
    }

    /// Whether this is exactly the canonical target encoding.
    pub fn matches_target(&self, target: &TargetFormat) -> bool {
        self.encoding == Encoding::Pcm
            && self.channels == target.channels
            && self.sample_rate_hz == target.sample_rate_hz
            && self.bits_per_sample == target.bits_per_sample
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}ch {}Hz {}bit",
            self.encoding, self.channels, self.sample_rate_hz, self.bits_per_sample
        )
    }
}

/// The canonical encoding every file should end up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFormat {
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,
    #[serde(default = "default_bits")]
    pub bits_per_sample: u16,
}

fn default_channels() -> u16 {
    1
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_bits() -> u16 {
    16
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            sample_rate_hz: default_sample_rate(),
            bits_per_sample: default_bits(),
        }
    }
}

impl TargetFormat {
    /// Creates a target with the given parameters.
    pub fn new(channels: u16, sample_rate_hz: u32, bits_per_sample: u16) -> Self {
        Self {
            channels,
            sample_rate_hz,
            bits_per_sample,
        }
    }

    /// Bytes per second of a conforming file, or `None` if the header
    /// fields cannot hold it.
    pub fn checked_byte_rate(&self) -> Option<u32> {
        let block_align = self.channels.checked_mul(self.bits_per_sample / 8)?;
        self.sample_rate_hz.checked_mul(u32::from(block_align))
    }

    /// The PCM descriptor a conforming file carries. Fields saturate for
    /// targets `validate_config` would reject.
    pub fn descriptor(&self) -> FormatDescriptor {
        let block_align = self.channels.saturating_mul(self.bits_per_sample / 8);
        FormatDescriptor {
            encoding: Encoding::Pcm,
            channels: self.channels,
            sample_rate_hz: self.sample_rate_hz,
            byte_rate: self.sample_rate_hz.saturating_mul(u32::from(block_align)),
            block_align,
            bits_per_sample: self.bits_per_sample,
        }
    }
}

/// Where a probed file falls relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Already in the target encoding; never touched.
    Canonical,
    /// Float, or PCM with other parameters; safe to convert.
    Convertible,
    /// Unknown encoding; needs an operator.
    NeedsReview,
}

/// Classifies a format against the target.
pub fn classify(format: &FormatDescriptor, target: &TargetFormat) -> Classification {
    match format.encoding {
        Encoding::Other(_) => Classification::NeedsReview,
        _ if format.matches_target(target) => Classification::Canonical,
        _ => Classification::Convertible,
    }
}
