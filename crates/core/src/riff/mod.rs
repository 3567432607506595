//! RIFF container walker.
//!
//! A RIFF/WAVE file is a 12-byte `RIFF <size> WAVE` header followed by a
//! sequence of tagged, length-prefixed chunks. Chunk lengths are 32-bit
//! little-endian and payloads are padded to an even length.
//!
//! [`ChunkReader`] walks that sequence forward-only. It never trusts a
//! declared length: a header that would read past end-of-file is reported as
//! [`ProbeError::OversizedChunk`] and a short tail as
//! [`ProbeError::TruncatedStream`].
//!
//! # Example
//!
//! ```ignore
//! use std::fs::File;
//! use std::io::BufReader;
//! use wavforge_core::riff::ChunkReader;
//!
//! let mut chunks = ChunkReader::open(BufReader::new(File::open("a.wav")?))?;
//! while let Some(header) = chunks.next_chunk()? {
//!     println!("{} ({} bytes)", header.tag, header.size);
//! }
//! ```

mod error;
mod reader;
mod types;

pub use error::ProbeError;
pub use reader::ChunkReader;
pub use types::{ChunkHeader, FourCc, StreamAnomaly, CHUNK_HEADER_LEN, RIFF_HEADER_LEN};
