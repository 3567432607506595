//! External transcoder seam.
//!
//! The [`Transcoder`] trait is the only place the batch pipeline touches the
//! outside world for re-encoding. [`FfmpegTranscoder`] runs ffmpeg as a child
//! process with a timeout; tests substitute
//! [`MockTranscoder`](crate::testing::MockTranscoder).
//!
//! A transcoder writes to a separate output path and never modifies its
//! input. A zero exit status is necessary but not sufficient: callers must
//! re-probe the output before trusting it.

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use ffmpeg::{pcm_codec, FfmpegTranscoder};
pub use traits::Transcoder;
pub use types::{TranscodeOutput, TranscodeRequest};
