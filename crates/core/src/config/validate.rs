use super::{types::Config, ConfigError};
use crate::transcoder::pcm_codec;

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}

/// Most channels a target may ask for.
pub const MAX_TARGET_CHANNELS: u16 = 255;

/// Validate configuration
/// Currently validates:
/// - Target channels are in 1..=255 and sample rate is not 0
/// - Target byte rate fits the 32-bit header field
/// - Target bit depth has a PCM encoder (8, 16, 24, 32)
/// - Transcoder path is set and timeout is not 0
/// - Ledger buffer size is not 0
/// - Batch worker count is not 0 and drift is in [0, 1)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Target validation
    if config.target.channels == 0 {
        return invalid("target.channels cannot be 0");
    }
    if config.target.channels > MAX_TARGET_CHANNELS {
        return invalid(format!(
            "target.channels must be at most {}, got {}",
            MAX_TARGET_CHANNELS, config.target.channels
        ));
    }
    if config.target.sample_rate_hz == 0 {
        return invalid("target.sample_rate_hz cannot be 0");
    }
    if pcm_codec(config.target.bits_per_sample).is_none() {
        return invalid(format!(
            "target.bits_per_sample must be 8, 16, 24 or 32, got {}",
            config.target.bits_per_sample
        ));
    }
    if config.target.checked_byte_rate().is_none() {
        return invalid(format!(
            "target.sample_rate_hz {} is too high for {} channels at {} bits",
            config.target.sample_rate_hz, config.target.channels, config.target.bits_per_sample
        ));
    }

    // Transcoder validation
    if config.transcoder.ffmpeg_path.as_os_str().is_empty() {
        return invalid("transcoder.ffmpeg_path cannot be empty");
    }
    if config.transcoder.timeout_secs == 0 {
        return invalid("transcoder.timeout_secs cannot be 0");
    }

    // Ledger validation
    if config.ledger.buffer_size == 0 {
        return invalid("ledger.buffer_size cannot be 0");
    }

    // Batch validation
    if config.batch.max_workers == 0 {
        return invalid("batch.max_workers cannot be 0");
    }
    if !(0.0..1.0).contains(&config.batch.max_duration_drift) {
        return invalid(format!(
            "batch.max_duration_drift must be in [0, 1), got {}",
            config.batch.max_duration_drift
        ));
    }

    Ok(())
}
