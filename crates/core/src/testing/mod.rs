//! Testing utilities: a mock transcoder and WAV fixture builders.
//!
//! # Example
//!
//! ```rust,ignore
//! use wavforge_core::testing::{fixtures::WavBuilder, MockBehavior, MockTranscoder};
//!
//! let path = WavBuilder::float32(1, 22050).with_seconds(1.0).write_to(dir, "a.wav")?;
//! let transcoder = MockTranscoder::new();
//! transcoder.set_behavior(&path, MockBehavior::Timeout).await;
//! ```

pub mod fixtures;
mod mock_transcoder;

pub use mock_transcoder::{MockBehavior, MockTranscoder, RecordedTranscode};
