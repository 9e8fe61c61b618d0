//! Record serialization trait for offset arrays.
//!
//! Every element type stored in an [`OffsetArray`](super::OffsetArray)
//! implements [`OffsetRecord`]. Flat records only provide header bytes (the
//! header *is* the record). Records that own variable-length data of their
//! own, such as a texture whose filename is stored elsewhere in the file, set
//! [`OffsetRecord::NESTED`] and append that data in
//! [`OffsetRecord::append_payload`] before their header is written.

use super::arena::ByteArena;

/// Trait for records laid out contiguously inside an offset array.
///
/// # Example
///
/// ```
/// use wow_common::formats::{ByteArena, OffsetArray};
///
/// let mut lookup: OffsetArray<u16> = OffsetArray::new(vec![0, 1, 2]);
/// let mut arena = ByteArena::new();
/// arena.append(&[0; 8]);
/// lookup.append_and_resolve(&mut arena);
///
/// assert_eq!(lookup.offset(), 8);
/// assert_eq!(arena.len(), 8 + 3 * 2);
/// ```
pub trait OffsetRecord {
    /// Whether records carry a payload outside the header block
    const NESTED: bool = false;

    /// Size of the fixed part written inside the array
    fn header_size(&self) -> usize;

    /// Write the fixed part. Called after [`append_payload`](Self::append_payload).
    fn write_header(&self, out: &mut Vec<u8>);

    /// Append variable-length data and resolve nested offsets
    fn append_payload(&mut self, _arena: &mut ByteArena) {}
}

macro_rules! impl_primitive_record {
    ($($t:ty),*) => {
        $(
            impl OffsetRecord for $t {
                fn header_size(&self) -> usize {
                    std::mem::size_of::<$t>()
                }

                fn write_header(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_primitive_record!(u8, u16, i16, u32, i32, f32);

impl OffsetRecord for glam::Vec3 {
    fn header_size(&self) -> usize {
        12
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::bytes_of(self));
    }
}

/// ASCII bytes of `s` followed by a NUL terminator
pub fn nul_terminated(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

/// Pad `out` with zeros to a multiple of `alignment`
pub fn pad_to(out: &mut Vec<u8>, alignment: usize) {
    while out.len() % alignment != 0 {
        out.push(0);
    }
}
