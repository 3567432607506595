//! Playback duration from format parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::format::FormatDescriptor;

/// Size of a minimal WAV header (`RIFF` + `fmt ` + `data` headers).
///
/// The fallback assumes no other chunks precede the samples, so files with
/// extra metadata get an overestimated duration.
pub const FIXED_HEADER_OVERHEAD: u64 = 44;

/// A duration together with how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seconds", rename_all = "snake_case")]
pub enum DurationEstimate {
    /// Computed from the data chunk length.
    Exact(f64),
    /// Estimated from the file size; no data chunk was located.
    Approximate(f64),
}

impl DurationEstimate {
    pub fn seconds(&self) -> f64 {
        match self {
            Self::Exact(s) | Self::Approximate(s) => *s,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

impl fmt::Display for DurationEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "{:.3}s", s),
            Self::Approximate(s) => write!(f, "~{:.3}s", s),
        }
    }
}

/// Computes playback duration.
///
/// With a data chunk length the result is exact. Without one it falls back to
/// `(file_size - 44) / byte_rate`. Returns `None` instead of dividing by zero.
pub fn estimate(
    format: &FormatDescriptor,
    data_chunk_len: Option<u32>,
    file_size: u64,
) -> Option<DurationEstimate> {
    match data_chunk_len {
        Some(len) => {
            let bytes_per_second = format.sample_rate_hz as u64
                * format.channels as u64
                * format.bytes_per_sample() as u64;
            if bytes_per_second == 0 {
                return None;
            }
            Some(DurationEstimate::Exact(
                len as f64 / bytes_per_second as f64,
            ))
        }
        None => {
            if format.byte_rate == 0 || file_size <= FIXED_HEADER_OVERHEAD {
                return None;
            }
            Some(DurationEstimate::Approximate(
                (file_size - FIXED_HEADER_OVERHEAD) as f64 / format.byte_rate as f64,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::format::{Encoding, TargetFormat};

    fn pcm(channels: u16, rate: u32, bits: u16) -> FormatDescriptor {
        TargetFormat::new(channels, rate, bits).descriptor()
    }

    #[test]
    fn test_exact_duration() {
        let format = pcm(2, 44100, 16);
        let est = estimate(&format, Some(176_400 * 3), 0).unwrap();
        assert!(est.is_exact());
        assert!((est.seconds() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_exact_ignores_declared_byte_rate() {
        let mut format = pcm(1, 16000, 16);
        format.byte_rate = 1;
        let est = estimate(&format, Some(16_000), 0).unwrap();
        assert!((est.seconds() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_exact_float_format() {
        let format = FormatDescriptor {
            encoding: Encoding::IeeeFloat,
            channels: 1,
            sample_rate_hz: 22050,
            byte_rate: 88_200,
            block_align: 4,
            bits_per_sample: 32,
        };
        let est = estimate(&format, Some(88_200 * 2 + 44_100), 0).unwrap();
        assert!((est.seconds() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_guards() {
        let mut format = pcm(1, 16000, 16);
        format.sample_rate_hz = 0;
        assert!(estimate(&format, Some(100), 0).is_none());

        let mut format = pcm(1, 16000, 16);
        format.channels = 0;
        assert!(estimate(&format, Some(100), 0).is_none());

        let mut format = pcm(1, 16000, 16);
        format.bits_per_sample = 4;
        assert!(estimate(&format, Some(100), 0).is_none());
    }

    #[test]
    fn test_fallback_is_approximate() {
        let format = pcm(1, 16000, 16);
        let est = estimate(&format, None, 44 + 64_000).unwrap();
        assert!(!est.is_exact());
        assert!((est.seconds() - 2.0).abs() < 1e-6);
        assert_eq!(est.to_string(), "~2.000s");
    }

    #[test]
    fn test_fallback_guards() {
        let format = pcm(1, 16000, 16);
        assert!(estimate(&format, None, 44).is_none());
        assert!(estimate(&format, None, 10).is_none());

        let mut zero_rate = format;
        zero_rate.byte_rate = 0;
        assert!(estimate(&zero_rate, None, 10_000).is_none());
    }

    #[test]
    fn test_fallback_never_none_when_preconditions_hold() {
        let format = pcm(1, 8000, 8);
        for size in [45u64, 100, 4096, 1 << 32] {
            assert!(estimate(&format, None, size).is_some(), "size {}", size);
        }
    }
}
