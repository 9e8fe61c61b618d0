//! M2 skin profile (`<model>00.skin`)
//!
//! Offsets are relative to the start of the `.skin` file.
//!
//! # Layout
//! ```text
//! 0x00: magic "SKIN"
//! 0x04: vertex lookup      (count, offset)  u16 per vertex
//! 0x0C: triangle indices   (count, offset)  u16, 3 per triangle
//! 0x14: bone indices       (count, offset)  u8 x4 per vertex
//! 0x1C: submeshes          (count, offset)  48 bytes each
//! 0x24: texture units      (count, offset)  24 bytes each
//! 0x2C: bone count max u32
//! 0x30: array data (unaligned)
//! ```

use glam::Vec3;

use super::arena::ByteArena;
use super::offset_array::OffsetArray;
use super::serialization::OffsetRecord;

pub const SKIN_MAGIC: [u8; 4] = *b"SKIN";
pub const SKIN_HEADER_SIZE: usize = 48;
pub const SKIN_BONE_COUNT_MAX: u32 = 21;

/// Per-vertex bone palette entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkinBoneIndices(pub [u8; 4]);

impl OffsetRecord for SkinBoneIndices {
    fn header_size(&self) -> usize {
        4
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
}

/// A run of vertices and triangle indices drawn with one texture unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinSubmesh {
    pub vertex_start: u16,
    pub vertex_count: u16,
    pub index_start: u16,
    pub index_count: u16,
    /// Average of the submesh's vertex positions
    pub center: Vec3,
    /// Center of the submesh's bounding box
    pub sort_center: Vec3,
    /// Farthest vertex distance from `sort_center`
    pub sort_radius: f32,
}

impl SkinSubmesh {
    pub const SIZE: usize = 48;
}

impl OffsetRecord for SkinSubmesh {
    fn header_size(&self) -> usize {
        Self::SIZE
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&0u32.to_le_bytes()); // skin section id
        out.extend_from_slice(&self.vertex_start.to_le_bytes());
        out.extend_from_slice(&self.vertex_count.to_le_bytes());
        out.extend_from_slice(&self.index_start.to_le_bytes());
        out.extend_from_slice(&self.index_count.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // bone count
        out.extend_from_slice(&0u16.to_le_bytes()); // bone lookup start
        out.extend_from_slice(&1u16.to_le_bytes()); // bones influencing
        out.extend_from_slice(&0u16.to_le_bytes()); // center bone
        out.extend_from_slice(bytemuck::bytes_of(&self.center));
        out.extend_from_slice(bytemuck::bytes_of(&self.sort_center));
        out.extend_from_slice(&self.sort_radius.to_le_bytes());
    }
}

/// Binds a submesh to a material and texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinTextureUnit {
    pub submesh: u16,
    pub material: u16,
    pub texture_lookup: u16,
}

impl SkinTextureUnit {
    pub const SIZE: usize = 24;
    const FLAG_STATIC: u8 = 0x10;
}

impl OffsetRecord for SkinTextureUnit {
    fn header_size(&self) -> usize {
        Self::SIZE
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.push(Self::FLAG_STATIC);
        out.push(0); // priority plane
        out.extend_from_slice(&0u16.to_le_bytes()); // shader
        out.extend_from_slice(&self.submesh.to_le_bytes());
        out.extend_from_slice(&self.submesh.to_le_bytes()); // geoset
        out.extend_from_slice(&(-1i16).to_le_bytes()); // color
        out.extend_from_slice(&self.material.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // material layer
        out.extend_from_slice(&1u16.to_le_bytes()); // texture count
        out.extend_from_slice(&self.texture_lookup.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // texture unit lookup
        out.extend_from_slice(&0u16.to_le_bytes()); // transparency lookup
        out.extend_from_slice(&0u16.to_le_bytes()); // transform lookup
    }
}

#[derive(Debug, Clone, Default)]
pub struct M2Skin {
    pub vertex_lookup: OffsetArray<u16>,
    pub triangle_indices: OffsetArray<u16>,
    pub bone_indices: OffsetArray<SkinBoneIndices>,
    pub submeshes: OffsetArray<SkinSubmesh>,
    pub texture_units: OffsetArray<SkinTextureUnit>,
}

impl M2Skin {
    pub fn to_bytes(mut self) -> Vec<u8> {
        let mut arena = ByteArena::new();
        arena.append(&SKIN_MAGIC);
        let vertex_slot = self.vertex_lookup.reserve_header(&mut arena);
        let triangle_slot = self.triangle_indices.reserve_header(&mut arena);
        let bone_slot = self.bone_indices.reserve_header(&mut arena);
        let submesh_slot = self.submeshes.reserve_header(&mut arena);
        let unit_slot = self.texture_units.reserve_header(&mut arena);
        arena.append(&SKIN_BONE_COUNT_MAX.to_le_bytes());

        self.vertex_lookup.append_and_resolve(&mut arena);
        self.triangle_indices.append_and_resolve(&mut arena);
        self.bone_indices.append_and_resolve(&mut arena);
        self.submeshes.append_and_resolve(&mut arena);
        self.texture_units.append_and_resolve(&mut arena);

        self.vertex_lookup.commit_header(&mut arena, vertex_slot);
        self.triangle_indices.commit_header(&mut arena, triangle_slot);
        self.bone_indices.commit_header(&mut arena, bone_slot);
        self.submeshes.commit_header(&mut arena, submesh_slot);
        self.texture_units.commit_header(&mut arena, unit_slot);
        arena.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn test_skin_header_offsets_relative_to_file() {
        let skin = M2Skin {
            vertex_lookup: OffsetArray::new(vec![0, 1, 2, 3]),
            triangle_indices: OffsetArray::new(vec![0, 1, 2, 2, 1, 3]),
            bone_indices: OffsetArray::new(vec![SkinBoneIndices::default(); 4]),
            submeshes: OffsetArray::new(vec![SkinSubmesh {
                vertex_start: 0,
                vertex_count: 4,
                index_start: 0,
                index_count: 6,
                center: Vec3::ZERO,
                sort_center: Vec3::ZERO,
                sort_radius: 1.0,
            }]),
            texture_units: OffsetArray::new(vec![SkinTextureUnit {
                submesh: 0,
                material: 0,
                texture_lookup: 0,
            }]),
        };
        let bytes = skin.to_bytes();
        assert_eq!(&bytes[0..4], b"SKIN");
        assert_eq!(read_u32(&bytes, 0x2C), SKIN_BONE_COUNT_MAX);

        assert_eq!(read_u32(&bytes, 0x04), 4);
        assert_eq!(read_u32(&bytes, 0x08) as usize, SKIN_HEADER_SIZE);
        assert_eq!(read_u32(&bytes, 0x0C), 6);
        assert_eq!(read_u32(&bytes, 0x10) as usize, SKIN_HEADER_SIZE + 8);
        assert_eq!(read_u32(&bytes, 0x18) as usize, SKIN_HEADER_SIZE + 8 + 12);

        let units = read_u32(&bytes, 0x28) as usize;
        assert_eq!(bytes.len(), units + SkinTextureUnit::SIZE);
        let submeshes = read_u32(&bytes, 0x20) as usize;
        assert_eq!(units - submeshes, SkinSubmesh::SIZE);
    }
}
