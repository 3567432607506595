//! Safe batch normalization of RIFF/WAVE corpora.
//!
//! - [`riff`] walks the chunk structure of a container.
//! - [`probe`] extracts the format and playback duration.
//! - [`batch`] converts non-canonical files through a [`transcoder`],
//!   protected by the [`ledger`].

pub mod batch;
pub mod config;
pub mod ledger;
pub mod metrics;
pub mod probe;
pub mod riff;
pub mod testing;
pub mod transcoder;

pub use batch::{
    BatchConfig, BatchReport, CancelHandle, ConversionOutcome, FailureReason, ProbeSummary,
    TranscodeOrchestrator,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, resolve_config_path,
    validate_config, Config, ConfigError,
};
pub use ledger::{BackupRecord, FileAttributes, LedgerConfig, LedgerError, RecoveryReport, SafetyLedger};
pub use probe::{
    probe, probe_path, Classification, DurationEstimate, Encoding, FormatDescriptor, ProbeError,
    ProbeResult, TargetFormat,
};
pub use riff::{ChunkHeader, ChunkReader, FourCc, StreamAnomaly};
pub use transcoder::{FfmpegTranscoder, TranscodeError, Transcoder, TranscoderConfig};
