//! Format probing and duration estimation for WAV files.
//!
//! [`probe`] walks a container with [`ChunkReader`](crate::riff::ChunkReader),
//! parses the `fmt ` chunk into a [`FormatDescriptor`] and computes the
//! playback duration from the `data` chunk. When no data chunk can be
//! located the duration falls back to a file-size estimate, returned as
//! [`DurationEstimate::Approximate`] so callers can tell the two apart.
//!
//! Unknown chunks are skipped. A file without a format chunk, or with a
//! broken structure before it, is an error; a broken structure after it is
//! carried in [`ProbeResult::anomaly`].

pub mod duration;
mod format;
mod prober;

pub use crate::riff::ProbeError;
pub use duration::{estimate, DurationEstimate, FIXED_HEADER_OVERHEAD};
pub use format::{
    classify, Classification, Encoding, FormatDescriptor, TargetFormat, FORMAT_CHUNK_LEN,
};
pub use prober::{probe, probe_path, ProbeResult};
