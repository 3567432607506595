use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::ledger::LedgerConfig;
use crate::probe::TargetFormat;
use crate::transcoder::TranscoderConfig;

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Canonical encoding files are converted to.
    #[serde(default)]
    pub target: TargetFormat,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}
