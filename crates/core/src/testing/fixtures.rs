//! Builders for WAV byte streams used in tests.

use std::path::{Path, PathBuf};

use crate::probe::{Encoding, FormatDescriptor, TargetFormat};

type RawChunk = ([u8; 4], Vec<u8>);

/// Builds RIFF/WAVE files with controllable structure.
///
/// By default the file holds a `fmt ` chunk followed by an empty `data`
/// chunk. Every knob exists to produce one specific kind of defect.
#[derive(Debug, Clone)]
pub struct WavBuilder {
    format: FormatDescriptor,
    riff_magic: [u8; 4],
    wave_magic: [u8; 4],
    include_format: bool,
    data: Option<Vec<u8>>,
    data_first: bool,
    declared_data_size: Option<u32>,
    before_format: Vec<RawChunk>,
    after_format: Vec<RawChunk>,
}

impl WavBuilder {
    /// A file with the given raw format tag and parameters.
    pub fn new(tag: u16, channels: u16, sample_rate_hz: u32, bits_per_sample: u16) -> Self {
        let block_align = channels * bits_per_sample.div_ceil(8);
        Self::from_descriptor(FormatDescriptor {
            encoding: Encoding::from_tag(tag),
            channels,
            sample_rate_hz,
            byte_rate: sample_rate_hz * block_align as u32,
            block_align,
            bits_per_sample,
        })
    }

    pub fn from_descriptor(format: FormatDescriptor) -> Self {
        Self {
            format,
            riff_magic: *b"RIFF",
            wave_magic: *b"WAVE",
            include_format: true,
            data: Some(Vec::new()),
            data_first: false,
            declared_data_size: None,
            before_format: Vec::new(),
            after_format: Vec::new(),
        }
    }

    /// 16-bit integer PCM.
    pub fn pcm16(channels: u16, sample_rate_hz: u32) -> Self {
        Self::new(Encoding::PCM_TAG, channels, sample_rate_hz, 16)
    }

    /// 32-bit IEEE float.
    pub fn float32(channels: u16, sample_rate_hz: u32) -> Self {
        Self::new(Encoding::IEEE_FLOAT_TAG, channels, sample_rate_hz, 32)
    }

    /// A file already in the target encoding.
    pub fn canonical(target: &TargetFormat) -> Self {
        Self::from_descriptor(target.descriptor())
    }

    /// Silent sample data for `frames` frames.
    pub fn with_frames(mut self, frames: usize) -> Self {
        self.data = Some(vec![0u8; frames * self.format.block_align as usize]);
        self
    }

    /// Silent sample data lasting `seconds`.
    pub fn with_seconds(self, seconds: f64) -> Self {
        let frames = (seconds * self.format.sample_rate_hz as f64).round() as usize;
        self.with_frames(frames)
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn without_data(mut self) -> Self {
        self.data = None;
        self
    }

    pub fn without_format(mut self) -> Self {
        self.include_format = false;
        self
    }

    /// Places the data chunk ahead of the format chunk.
    pub fn with_data_before_format(mut self) -> Self {
        self.data_first = true;
        self
    }

    /// Writes a data chunk length that differs from the actual payload.
    pub fn with_declared_data_size(mut self, size: u32) -> Self {
        self.declared_data_size = Some(size);
        self
    }

    pub fn with_riff_magic(mut self, magic: [u8; 4]) -> Self {
        self.riff_magic = magic;
        self
    }

    pub fn with_wave_magic(mut self, magic: [u8; 4]) -> Self {
        self.wave_magic = magic;
        self
    }

    pub fn with_chunk_before_format(mut self, tag: [u8; 4], payload: Vec<u8>) -> Self {
        self.before_format.push((tag, payload));
        self
    }

    pub fn with_chunk_after_format(mut self, tag: [u8; 4], payload: Vec<u8>) -> Self {
        self.after_format.push((tag, payload));
        self
    }

    fn push_chunk(body: &mut Vec<u8>, tag: &[u8; 4], declared: u32, payload: &[u8]) {
        body.extend_from_slice(tag);
        body.extend_from_slice(&declared.to_le_bytes());
        body.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            body.push(0);
        }
    }

    fn push_data(&self, body: &mut Vec<u8>) {
        if let Some(data) = &self.data {
            let declared = self.declared_data_size.unwrap_or(data.len() as u32);
            Self::push_chunk(body, b"data", declared, data);
        }
    }

    /// Serializes the file.
    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.wave_magic);

        for (tag, payload) in &self.before_format {
            Self::push_chunk(&mut body, tag, payload.len() as u32, payload);
        }
        if self.data_first {
            self.push_data(&mut body);
        }
        if self.include_format {
            let fmt = self.format.to_bytes();
            Self::push_chunk(&mut body, b"fmt ", fmt.len() as u32, &fmt);
        }
        for (tag, payload) in &self.after_format {
            Self::push_chunk(&mut body, tag, payload.len() as u32, payload);
        }
        if !self.data_first {
            self.push_data(&mut body);
        }

        let mut out = Vec::with_capacity(body.len() + 8);
        out.extend_from_slice(&self.riff_magic);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Serializes the file into `dir/name` and returns the path.
    pub fn write_to(&self, dir: &Path, name: &str) -> std::io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, self.build())?;
        Ok(path)
    }
}
