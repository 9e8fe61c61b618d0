//! Growable byte buffer with reserve/commit backpatching
//!
//! Headers whose contents depend on data written later are reserved as
//! zero-filled slots and committed once their values are known. Positions are
//! absolute offsets from the start of the buffer, which is the start of the
//! file being built.

/// A reserved, not yet committed byte range.
///
/// Consumed by [`ByteArena::commit`], so a slot can only be filled once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be committed"]
pub struct Reservation {
    offset: usize,
    len: usize,
}

impl Reservation {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct ByteArena {
    buf: Vec<u8>,
}

impl ByteArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current length as a file offset
    pub fn position(&self) -> u32 {
        assert!(
            self.buf.len() <= u32::MAX as usize,
            "buffer exceeds the u32 offset range"
        );
        self.buf.len() as u32
    }

    /// Append bytes, returning the offset they were written at
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.buf.len();
        self.buf.extend_from_slice(bytes);
        offset
    }

    /// Append `len` zero bytes to be filled in later
    pub fn reserve(&mut self, len: usize) -> Reservation {
        let offset = self.buf.len();
        self.buf.resize(offset + len, 0);
        Reservation { offset, len }
    }

    /// Fill a reserved slot. `bytes` must match the reserved length exactly.
    pub fn commit(&mut self, reservation: Reservation, bytes: &[u8]) {
        assert_eq!(
            bytes.len(),
            reservation.len,
            "commit of {} bytes into a {} byte reservation at {}",
            bytes.len(),
            reservation.len,
            reservation.offset
        );
        self.buf[reservation.offset..reservation.offset + reservation.len].copy_from_slice(bytes);
    }

    /// Pad with zeros until the length is a multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        let rem = self.buf.len() % alignment;
        if rem != 0 {
            self.buf.resize(self.buf.len() + alignment - rem, 0);
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_then_commit_patches_in_place() {
        let mut arena = ByteArena::new();
        arena.append(b"HEAD");
        let slot = arena.reserve(4);
        assert_eq!(slot.offset(), 4);
        arena.append(&[0xAA; 3]);
        arena.commit(slot, &7u32.to_le_bytes());
        assert_eq!(arena.as_slice(), &[b'H', b'E', b'A', b'D', 7, 0, 0, 0, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn test_align_pads_with_zeros() {
        let mut arena = ByteArena::new();
        arena.append(&[1; 5]);
        arena.align(16);
        assert_eq!(arena.len(), 16);
        assert!(arena.as_slice()[5..].iter().all(|&b| b == 0));
        arena.align(16);
        assert_eq!(arena.len(), 16);
    }

    #[test]
    #[should_panic(expected = "commit of 2 bytes into a 4 byte reservation")]
    fn test_commit_size_mismatch_panics() {
        let mut arena = ByteArena::new();
        let slot = arena.reserve(4);
        arena.commit(slot, &[1, 2]);
    }
}
