//! `(count, offset)` record arrays
//!
//! An [`OffsetArray`] is written in two phases. Its 8-byte header is reserved
//! wherever the containing format puts it, the records are appended to the
//! shared [`ByteArena`] later, and the header is then committed with the
//! resolved offset.
//!
//! # Layout
//! ```text
//! header: count u32, offset u32 (0 when count is 0)
//! data:   record headers, contiguous, in list order
//!         (nested records: aligned to 16, then each record's payload)
//! ```

use super::arena::{ByteArena, Reservation};
use super::serialization::OffsetRecord;

/// Size of the `(count, offset)` header
pub const OFFSET_ARRAY_HEADER_SIZE: usize = 8;

/// Alignment applied between a nested array's header block and its payloads
pub const NESTED_PAYLOAD_ALIGNMENT: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetArray<T> {
    records: Vec<T>,
    offset: u32,
    resolved: bool,
}

impl<T> Default for OffsetArray<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            offset: 0,
            resolved: false,
        }
    }
}

impl<T: OffsetRecord> OffsetArray<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            offset: 0,
            resolved: false,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: T) {
        assert!(!self.resolved, "push into a resolved offset array");
        self.records.push(record);
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn count(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolved offset (0 before resolution or when empty)
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Total size of the record headers
    pub fn data_size(&self) -> usize {
        self.records.iter().map(OffsetRecord::header_size).sum()
    }

    /// `(count, offset)` using the currently known offset
    pub fn header_bytes(&self) -> [u8; OFFSET_ARRAY_HEADER_SIZE] {
        let mut bytes = [0u8; OFFSET_ARRAY_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.count().to_le_bytes());
        bytes[4..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes
    }

    /// Append the records to `arena` and fix the offset.
    ///
    /// An empty array keeps offset 0 and writes nothing. Panics when called
    /// twice.
    pub fn append_and_resolve(&mut self, arena: &mut ByteArena) {
        assert!(!self.resolved, "offset array resolved twice");
        self.resolved = true;
        if self.records.is_empty() {
            self.offset = 0;
            return;
        }

        self.offset = arena.position();
        let size = self.data_size();
        let slot = arena.reserve(size);
        if T::NESTED {
            arena.align(NESTED_PAYLOAD_ALIGNMENT);
            for record in &mut self.records {
                record.append_payload(arena);
            }
        }

        let mut headers = Vec::with_capacity(size);
        for record in &self.records {
            record.write_header(&mut headers);
        }
        arena.commit(slot, &headers);
    }

    /// Reserve space for this array's header at the arena's current position
    pub fn reserve_header(&self, arena: &mut ByteArena) -> Reservation {
        arena.reserve(OFFSET_ARRAY_HEADER_SIZE)
    }

    /// Backpatch a header reserved with [`reserve_header`](Self::reserve_header).
    ///
    /// Panics if the array has not been resolved yet.
    pub fn commit_header(&self, arena: &mut ByteArena, slot: Reservation) {
        assert!(
            self.resolved,
            "header committed before the offset array was resolved"
        );
        arena.commit(slot, &self.header_bytes());
    }
}
