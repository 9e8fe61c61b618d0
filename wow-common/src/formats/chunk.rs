//! Tagged, length-prefixed chunks
//!
//! # Layout
//! ```text
//! 0x00: tag [u8; 4] (characters stored in reverse order, "MVER" -> "REVM")
//! 0x04: payload length u32
//! 0x08: payload
//! ```
//!
//! Chunks nest by placing wrapped chunks inside another chunk's payload. No
//! alignment padding is added here; formats that need it pad their payloads.

use std::fmt;

/// Header size of every chunk (tag + length)
pub const CHUNK_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk tag must be exactly 4 ASCII bytes, got {0:?}")]
    InvalidTag(String),
    #[error("truncated chunk: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
}

/// Four character chunk identifier, held in reading order
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag([u8; 4]);

impl ChunkTag {
    pub const fn from_bytes(tag: [u8; 4]) -> Self {
        Self(tag)
    }

    pub fn new(tag: &str) -> Result<Self, ChunkError> {
        let bytes: [u8; 4] = tag
            .as_bytes()
            .try_into()
            .map_err(|_| ChunkError::InvalidTag(tag.to_string()))?;
        if !bytes.is_ascii() {
            return Err(ChunkError::InvalidTag(tag.to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Byte order on disk
    pub fn wire_bytes(&self) -> [u8; 4] {
        let [a, b, c, d] = self.0;
        [d, c, b, a]
    }

    pub fn from_wire(bytes: [u8; 4]) -> Self {
        let [a, b, c, d] = bytes;
        Self([d, c, b, a])
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkTag({self})")
    }
}

/// Wrap `payload` in a chunk header
pub fn wrap(tag: ChunkTag, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + payload.len());
    out.extend_from_slice(&tag.wire_bytes());
    out.extend_from_slice(&payload_len(payload.len()).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn payload_len(len: usize) -> u32 {
    assert!(
        len <= u32::MAX as usize,
        "chunk payload of {len} bytes exceeds the u32 length field"
    );
    len as u32
}

/// Split the first chunk off `bytes`.
///
/// Returns `(tag, payload, rest)`.
pub fn unwrap(bytes: &[u8]) -> Result<(ChunkTag, &[u8], &[u8]), ChunkError> {
    if bytes.len() < CHUNK_HEADER_SIZE {
        return Err(ChunkError::Truncated {
            needed: CHUNK_HEADER_SIZE,
            available: bytes.len(),
        });
    }
    let tag = ChunkTag::from_wire([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let body = &bytes[CHUNK_HEADER_SIZE..];
    if body.len() < len {
        return Err(ChunkError::Truncated {
            needed: len,
            available: body.len(),
        });
    }
    let (payload, rest) = body.split_at(len);
    Ok((tag, payload, rest))
}

/// Iterator over consecutive chunks in a byte slice
pub struct ChunkReader<'a> {
    remaining: &'a [u8],
}

impl<'a> ChunkReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes }
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<(ChunkTag, &'a [u8]), ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        match unwrap(self.remaining) {
            Ok((tag, payload, rest)) => {
                self.remaining = rest;
                Some(Ok((tag, payload)))
            }
            Err(e) => {
                self.remaining = &[];
                Some(Err(e))
            }
        }
    }
}

/// Builds a chunk stream by concatenation
///
/// Nested chunks write their header first and patch the length once the
/// children are written.
#[derive(Debug, Default)]
pub struct ChunkWriter {
    buf: Vec<u8>,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a complete chunk
    pub fn chunk(&mut self, tag: ChunkTag, payload: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&tag.wire_bytes());
        self.buf
            .extend_from_slice(&payload_len(payload.len()).to_le_bytes());
        self.buf.extend_from_slice(payload);
        self
    }

    /// Append raw bytes to the current payload
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append a chunk whose payload is produced by `build`
    pub fn nested(&mut self, tag: ChunkTag, build: impl FnOnce(&mut ChunkWriter)) -> &mut Self {
        self.buf.extend_from_slice(&tag.wire_bytes());
        let len_pos = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        let start = self.buf.len();
        build(self);
        let len = payload_len(self.buf.len() - start);
        self.buf[len_pos..len_pos + 4].copy_from_slice(&len.to_le_bytes());
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
