//! Format probe built on the chunk walker.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::debug;

use crate::riff::{ChunkReader, FourCc, ProbeError, StreamAnomaly};

use super::duration::{estimate, DurationEstimate};
use super::format::{classify, Classification, FormatDescriptor, TargetFormat, FORMAT_CHUNK_LEN};

/// What a probe learned about one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub format: FormatDescriptor,
    /// `None` only if neither the exact nor the fallback computation worked.
    pub duration: Option<DurationEstimate>,
    pub data_chunk_found: bool,
    /// Declared data chunk length, when a well-formed one was found.
    pub data_len: Option<u32>,
    pub file_size: u64,
    /// Structural defect hit after the format chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<StreamAnomaly>,
}

impl ProbeResult {
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.map(|d| d.seconds())
    }

    /// A data chunk was found and no anomaly was hit.
    pub fn is_clean(&self) -> bool {
        self.data_chunk_found && self.anomaly.is_none()
    }

    pub fn classify(&self, target: &TargetFormat) -> Classification {
        classify(&self.format, target)
    }
}

/// Probes a seekable stream positioned anywhere; it is rewound first.
pub fn probe<R: Read + Seek>(reader: R) -> Result<ProbeResult, ProbeError> {
    let mut chunks = ChunkReader::open(reader)?;
    let file_size = chunks.stream_len();

    let mut format: Option<FormatDescriptor> = None;
    let mut data_len: Option<u32> = None;
    let mut anomaly: Option<StreamAnomaly> = None;

    loop {
        let header = match chunks.next_chunk() {
            Ok(Some(header)) => header,
            Ok(None) => break,
            Err(e) => match StreamAnomaly::from_error(&e) {
                Some(found) if format.is_some() => {
                    anomaly = Some(found);
                    break;
                }
                _ => return Err(e),
            },
        };

        if header.tag == FourCc::FMT && format.is_none() {
            let payload = chunks.read_payload(FORMAT_CHUNK_LEN)?;
            format = Some(FormatDescriptor::from_bytes(
                &payload,
                header.payload_offset(),
            )?);
            if data_len.is_some() {
                break;
            }
        } else if header.tag == FourCc::DATA && data_len.is_none() {
            data_len = Some(header.size);
            if format.is_some() {
                break;
            }
            chunks.skip_current()?;
        } else {
            debug!(tag = %header.tag, size = header.size, "skipping chunk");
            chunks.skip_current()?;
        }
    }

    let format = format.ok_or(ProbeError::MissingFormatChunk)?;
    if !format.is_consistent() {
        debug!(%format, byte_rate = format.byte_rate, block_align = format.block_align,
            "format chunk fields disagree");
    }

    Ok(ProbeResult {
        format,
        duration: estimate(&format, data_len, file_size),
        data_chunk_found: data_len.is_some(),
        data_len,
        file_size,
        anomaly,
    })
}

/// Opens and probes a file.
pub fn probe_path(path: &Path) -> Result<ProbeResult, ProbeError> {
    let file = File::open(path)?;
    let result = probe(BufReader::new(file));
    match &result {
        Ok(r) => debug!(path = %path.display(), format = %r.format, duration = ?r.duration, "probed"),
        Err(e) => debug!(path = %path.display(), error = %e, "probe failed"),
    }
    result
}
