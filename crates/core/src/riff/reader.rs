//! Sequential chunk walker.

use std::io::{Read, Seek, SeekFrom};

use super::error::ProbeError;
use super::types::{ChunkHeader, FourCc, CHUNK_HEADER_LEN, RIFF_HEADER_LEN};

/// Unread part of the chunk the walker is positioned in.
#[derive(Debug, Clone, Copy)]
struct CurrentChunk {
    remaining: u64,
    pad: u64,
}

/// Forward-only walker over the chunks of a RIFF/WAVE stream.
///
/// The walker owns its reader for the duration of one operation. Every
/// header it yields has been checked against the bytes left in the stream,
/// so a declared size never points past end-of-file.
pub struct ChunkReader<R> {
    reader: R,
    len: u64,
    pos: u64,
    riff_size: u32,
    current: Option<CurrentChunk>,
    finished: bool,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Validates the outer `RIFF <size> WAVE` header and positions the walker
    /// at the first chunk.
    pub fn open(mut reader: R) -> Result<Self, ProbeError> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        if len < RIFF_HEADER_LEN {
            return Err(ProbeError::not_a_container(format!(
                "stream is {} bytes, shorter than the {}-byte RIFF header",
                len, RIFF_HEADER_LEN
            )));
        }

        let mut header = [0u8; RIFF_HEADER_LEN as usize];
        reader.read_exact(&mut header)?;

        if header[0..4] != *FourCc::RIFF.as_bytes() {
            return Err(ProbeError::not_a_container("missing RIFF magic"));
        }
        if header[8..12] != *FourCc::WAVE.as_bytes() {
            return Err(ProbeError::not_a_container("missing WAVE form type"));
        }

        let riff_size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        Ok(Self {
            reader,
            len,
            pos: RIFF_HEADER_LEN,
            riff_size,
            current: None,
            finished: false,
        })
    }

    /// Total length of the underlying stream in bytes.
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    /// Size field declared in the RIFF header.
    pub fn riff_size(&self) -> u32 {
        self.riff_size
    }

    /// Current absolute position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes between the current position and end-of-stream.
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// Reads the next chunk header, skipping whatever is left of the
    /// previous chunk first.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<ChunkHeader>, ProbeError> {
        if self.finished {
            return Ok(None);
        }

        self.skip_current()?;

        let remaining = self.remaining();
        if remaining == 0 {
            self.finished = true;
            return Ok(None);
        }
        if remaining < CHUNK_HEADER_LEN {
            self.finished = true;
            return Err(ProbeError::TruncatedStream {
                offset: self.pos,
                needed: CHUNK_HEADER_LEN,
                remaining,
            });
        }

        let mut buf = [0u8; CHUNK_HEADER_LEN as usize];
        self.reader.read_exact(&mut buf)?;

        let header = ChunkHeader {
            tag: FourCc([buf[0], buf[1], buf[2], buf[3]]),
            size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            offset: self.pos,
        };
        self.pos += CHUNK_HEADER_LEN;

        let available = self.remaining();
        if header.size as u64 > available {
            self.finished = true;
            return Err(ProbeError::OversizedChunk {
                tag: header.tag,
                offset: header.offset,
                declared: header.size,
                remaining: available,
            });
        }

        let size = header.size as u64;
        self.current = Some(CurrentChunk {
            remaining: size,
            pad: size & 1,
        });

        tracing::trace!(
            tag = %header.tag,
            size = header.size,
            offset = header.offset,
            "chunk header"
        );

        Ok(Some(header))
    }

    /// Skips the unread payload of the current chunk, including its pad byte.
    ///
    /// A pad byte missing at the very end of the stream is tolerated.
    pub fn skip_current(&mut self) -> Result<(), ProbeError> {
        if let Some(current) = self.current.take() {
            let skip = (current.remaining + current.pad).min(self.remaining());
            if skip > 0 {
                self.reader.seek(SeekFrom::Current(skip as i64))?;
                self.pos += skip;
            }
        }
        Ok(())
    }

    /// Reads up to `max` bytes from the current chunk's payload.
    pub fn read_payload(&mut self, max: usize) -> Result<Vec<u8>, ProbeError> {
        let Some(current) = self.current.as_mut() else {
            return Ok(Vec::new());
        };

        let n = (max as u64).min(current.remaining);
        let mut buf = vec![0u8; n as usize];
        self.reader.read_exact(&mut buf)?;
        current.remaining -= n;
        self.pos += n;
        Ok(buf)
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> Iterator for ChunkReader<R> {
    type Item = Result<ChunkHeader, ProbeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(header)) => Some(Ok(header)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
