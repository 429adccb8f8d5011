//! Index file record layout
//!
//! The index file holds `length` fixed-size records. Record `i` lives at byte
//! `16 * i` and is the little-endian pair `(offset: u64, size: i64)`. A size
//! of `-1` marks a slot that has never been written; its offset is ignored.
//! This layout is shared by every file-backed cache so that preserved files
//! can be preloaded by either implementation.

/// Size in bytes of one index record
pub const RECORD_SIZE: usize = 16;

/// `size` value of an unwritten slot
pub const EMPTY_SIZE: i64 = -1;

/// One slot of the index file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub offset: u64,
    pub size: i64,
}

impl IndexRecord {
    /// The sentinel record `(0, -1)`
    pub const EMPTY: Self = Self {
        offset: 0,
        size: EMPTY_SIZE,
    };

    pub fn new(offset: u64, size: u64) -> Self {
        Self {
            offset,
            size: size as i64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size < 0
    }

    /// Blob length, or `None` for an unwritten slot
    pub fn len(&self) -> Option<u64> {
        (self.size >= 0).then_some(self.size as u64)
    }

    /// Byte position of slot `index` in the index file
    pub fn position(index: usize) -> u64 {
        (index * RECORD_SIZE) as u64
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut offset = [0u8; 8];
        let mut size = [0u8; 8];
        offset.copy_from_slice(&buf[..8]);
        size.copy_from_slice(&buf[8..]);
        Self {
            offset: u64::from_le_bytes(offset),
            size: i64::from_le_bytes(size),
        }
    }

    /// Contents of a fresh index file with every slot empty
    pub fn empty_index(length: usize) -> Vec<u8> {
        let record = Self::EMPTY.encode();
        let mut buf = Vec::with_capacity(length * RECORD_SIZE);
        for _ in 0..length {
            buf.extend_from_slice(&record);
        }
        buf
    }
}
