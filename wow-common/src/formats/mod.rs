//! WoW binary container formats
//!
//! Two composition styles are used:
//! - chunked files (WMO root and group) built from [`chunk`] wrappers
//! - offset-array files (M2 model and skin) built on a [`ByteArena`], where
//!   `(count, offset)` headers are reserved first and backpatched once the
//!   array data has been appended
//!
//! Every record stored in an offset array implements [`OffsetRecord`].

pub mod arena;
pub mod chunk;
pub mod m2;
pub mod offset_array;
mod serialization;
pub mod skin;
pub mod wmo_group;
pub mod wmo_root;

pub use arena::{ByteArena, Reservation};
pub use chunk::{ChunkError, ChunkReader, ChunkTag, ChunkWriter, unwrap, wrap};
pub use m2::{M2Bone, M2Material, M2Model, M2Sequence, M2Texture, M2Vertex, NoRecord};
pub use offset_array::OffsetArray;
pub use serialization::{OffsetRecord, nul_terminated, pad_to};
pub use skin::{M2Skin, SkinBoneIndices, SkinSubmesh, SkinTextureUnit};
pub use wmo_group::{BspNode, BspNodeKind, WmoBatch, WmoGroup};
pub use wmo_root::{DoodadPlacement, GroupNameTable, WmoGroupInfo, WmoMaterial, WmoRoot};

/// Root file extension
pub const WMO_EXT: &str = "wmo";
/// Model file extension
pub const M2_EXT: &str = "m2";
/// Skin profile extension
pub const SKIN_EXT: &str = "skin";

/// Errors raised while fitting geometry into a format's field widths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("{what} value {value} exceeds the field limit of {max}")]
    FieldOverflow {
        what: &'static str,
        value: usize,
        max: usize,
    },
}

/// Narrow a count or index to `u16`, naming the field on failure
pub fn to_u16(what: &'static str, value: usize) -> Result<u16, FormatError> {
    u16::try_from(value).map_err(|_| FormatError::FieldOverflow {
        what,
        value,
        max: u16::MAX as usize,
    })
}

/// Narrow a count or index to `u8`, naming the field on failure
pub fn to_u8(what: &'static str, value: usize) -> Result<u8, FormatError> {
    u8::try_from(value).map_err(|_| FormatError::FieldOverflow {
        what,
        value,
        max: u8::MAX as usize,
    })
}
