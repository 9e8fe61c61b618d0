//! WMO group file (`<zone>_NNN.wmo`)
//!
//! # Layout
//! ```text
//! MVER  version u32 (17)
//! MOGP  68-byte header, then sub-chunks:
//!   MOPY  flags u8, material u8        per triangle (0xFF = not rendered)
//!   MOVI  u16 x3                       per triangle
//!   MOVT  f32 x3                       per vertex
//!   MONR  f32 x3                       per vertex
//!   MOTV  f32 x2                       per vertex
//!   MOBA  24-byte render batches
//!   MODR  u16 doodad references        (only with doodads)
//!   MOBN  16-byte collision nodes
//!   MOBR  u16 collision face indices
//!   MOCV  BGRA u8 x4 per vertex        (only with vertex colors)
//! ```
//!
//! MOGP header:
//! ```text
//! 0x00: group name offset u32 (into root MOGN)
//! 0x04: descriptive name offset u32
//! 0x08: flags u32
//! 0x0C: bounding box f32 x6
//! 0x24: portal start u16, portal count u16
//! 0x28: transparent / interior / exterior batch counts u16 x3, padding u16
//! 0x30: fog ids u8 x4
//! 0x34: liquid type u32
//! 0x38: group id u32
//! 0x3C: two unused u32
//! ```

use glam::{Vec2, Vec3};

use super::chunk::{ChunkTag, ChunkWriter};
use crate::bounds::{BoundingBox, LowResBox};

pub const WMO_VERSION: u32 = 17;

/// Liquid type for groups without liquid
pub const LIQUID_TYPE_NONE: u32 = 15;

/// MOPY material value for triangles that collide but are not drawn
pub const NON_RENDERABLE_MATERIAL: u8 = 0xFF;

pub const MVER: ChunkTag = ChunkTag::from_bytes(*b"MVER");
pub const MOGP: ChunkTag = ChunkTag::from_bytes(*b"MOGP");
pub const MOPY: ChunkTag = ChunkTag::from_bytes(*b"MOPY");
pub const MOVI: ChunkTag = ChunkTag::from_bytes(*b"MOVI");
pub const MOVT: ChunkTag = ChunkTag::from_bytes(*b"MOVT");
pub const MONR: ChunkTag = ChunkTag::from_bytes(*b"MONR");
pub const MOTV: ChunkTag = ChunkTag::from_bytes(*b"MOTV");
pub const MOBA: ChunkTag = ChunkTag::from_bytes(*b"MOBA");
pub const MODR: ChunkTag = ChunkTag::from_bytes(*b"MODR");
pub const MOBN: ChunkTag = ChunkTag::from_bytes(*b"MOBN");
pub const MOBR: ChunkTag = ChunkTag::from_bytes(*b"MOBR");
pub const MOCV: ChunkTag = ChunkTag::from_bytes(*b"MOCV");

/// MOGP / MOGI flag bits
pub mod group_flags {
    pub const HAS_BSP_TREE: u32 = 0x1;
    pub const HAS_VERTEX_COLORS: u32 = 0x4;
    pub const IS_OUTDOORS: u32 = 0x8;
    pub const HAS_DOODADS: u32 = 0x800;
    pub const IS_INDOORS: u32 = 0x2000;
}

/// Collision node type, stored in the node's flag field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BspNodeKind {
    /// Split by a plane of constant X
    SplitX = 0,
    /// Split by a plane of constant Y
    SplitY = 1,
    SplitZ = 2,
    Leaf = 4,
}

/// Collision tree node (MOBN entry)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BspNode {
    pub kind: BspNodeKind,
    /// Child on the lower side of the plane, -1 for none
    pub neg_child: i16,
    /// Child on the upper side of the plane, -1 for none
    pub pos_child: i16,
    pub face_count: u16,
    /// First entry in the face index list
    pub face_start: u32,
    pub plane_distance: f32,
}

impl BspNode {
    pub const SIZE: usize = 16;

    pub fn leaf(face_start: u32, face_count: u16) -> Self {
        Self {
            kind: BspNodeKind::Leaf,
            neg_child: -1,
            pos_child: -1,
            face_count,
            face_start,
            plane_distance: 0.0,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&(self.kind as u16).to_le_bytes());
        bytes[2..4].copy_from_slice(&self.neg_child.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.pos_child.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.face_count.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.face_start.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.plane_distance.to_le_bytes());
        bytes
    }
}

/// Render batch record (MOBA entry)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WmoBatch {
    pub bounds: LowResBox,
    pub first_index: u32,
    pub index_count: u16,
    pub first_vertex: u16,
    pub last_vertex: u16,
    pub material: u8,
}

impl WmoBatch {
    pub const SIZE: usize = 24;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..12].copy_from_slice(&self.bounds.to_bytes());
        bytes[12..16].copy_from_slice(&self.first_index.to_le_bytes());
        bytes[16..18].copy_from_slice(&self.index_count.to_le_bytes());
        bytes[18..20].copy_from_slice(&self.first_vertex.to_le_bytes());
        bytes[20..22].copy_from_slice(&self.last_vertex.to_le_bytes());
        // byte 22 is padding
        bytes[23] = self.material;
        bytes
    }
}

/// One group file, ready to serialize
#[derive(Debug, Clone, Default)]
pub struct WmoGroup {
    pub name_offset: u32,
    pub descriptive_name_offset: u32,
    pub flags: u32,
    pub bounds: BoundingBox,
    pub group_id: u32,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// RGBA per vertex
    pub colors: Option<Vec<[u8; 4]>>,
    pub faces: Vec<[u16; 3]>,
    /// Material per face, [`NON_RENDERABLE_MATERIAL`] for collision-only faces
    pub face_materials: Vec<u8>,
    pub batches: Vec<WmoBatch>,
    pub doodad_refs: Vec<u16>,
    pub bsp_nodes: Vec<BspNode>,
    pub bsp_faces: Vec<u16>,
}

impl WmoGroup {
    pub const HEADER_SIZE: usize = 68;

    pub fn header_bytes(&self) -> [u8; Self::HEADER_SIZE] {
        let mut bytes = [0u8; Self::HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.name_offset.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.descriptive_name_offset.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..36].copy_from_slice(&self.bounds.to_bytes());
        // portals: start and count stay 0
        // all batches are exterior batches
        let batch_count = self.batches.len() as u16;
        bytes[44..46].copy_from_slice(&batch_count.to_le_bytes());
        // fog ids stay 0
        bytes[52..56].copy_from_slice(&LIQUID_TYPE_NONE.to_le_bytes());
        bytes[56..60].copy_from_slice(&self.group_id.to_le_bytes());
        bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ChunkWriter::new();
        writer.chunk(MVER, &WMO_VERSION.to_le_bytes());
        writer.nested(MOGP, |w| {
            w.raw(&self.header_bytes());

            let mopy: Vec<u8> = self
                .face_materials
                .iter()
                .flat_map(|&material| [0u8, material])
                .collect();
            w.chunk(MOPY, &mopy);
            w.chunk(MOVI, bytemuck::cast_slice(&self.faces));
            w.chunk(MOVT, bytemuck::cast_slice(&self.positions));
            w.chunk(MONR, bytemuck::cast_slice(&self.normals));
            w.chunk(MOTV, bytemuck::cast_slice(&self.uvs));

            let moba: Vec<u8> = self.batches.iter().flat_map(|b| b.to_bytes()).collect();
            w.chunk(MOBA, &moba);

            if !self.doodad_refs.is_empty() {
                w.chunk(MODR, bytemuck::cast_slice(&self.doodad_refs));
            }

            let mobn: Vec<u8> = self.bsp_nodes.iter().flat_map(|n| n.to_bytes()).collect();
            w.chunk(MOBN, &mobn);
            w.chunk(MOBR, bytemuck::cast_slice(&self.bsp_faces));

            if let Some(colors) = &self.colors {
                let bgra: Vec<u8> = colors.iter().flat_map(|&[r, g, b, a]| [b, g, r, a]).collect();
                w.chunk(MOCV, &bgra);
            }
        });
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::chunk::{unwrap, ChunkReader};

    fn sample_group() -> WmoGroup {
        WmoGroup {
            name_offset: 2,
            descriptive_name_offset: 8,
            flags: group_flags::HAS_BSP_TREE | group_flags::IS_OUTDOORS,
            bounds: BoundingBox::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)),
            group_id: 3001,
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            colors: None,
            faces: vec![[0, 1, 2]],
            face_materials: vec![4],
            batches: vec![WmoBatch {
                bounds: BoundingBox::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)).to_low_res(),
                first_index: 0,
                index_count: 3,
                first_vertex: 0,
                last_vertex: 2,
                material: 4,
            }],
            doodad_refs: Vec::new(),
            bsp_nodes: vec![BspNode::leaf(0, 1)],
            bsp_faces: vec![0],
        }
    }

    #[test]
    fn test_group_chunk_order() {
        let bytes = sample_group().to_bytes();
        let (tag, version, rest) = unwrap(&bytes).unwrap();
        assert_eq!(tag, MVER);
        assert_eq!(version, &WMO_VERSION.to_le_bytes());

        let (tag, mogp, rest) = unwrap(rest).unwrap();
        assert_eq!(tag, MOGP);
        assert!(rest.is_empty());

        let header = &mogp[..WmoGroup::HEADER_SIZE];
        assert_eq!(&header[52..56], &LIQUID_TYPE_NONE.to_le_bytes());
        assert_eq!(&header[56..60], &3001u32.to_le_bytes());
        assert_eq!(&header[44..46], &1u16.to_le_bytes());

        let tags: Vec<ChunkTag> = ChunkReader::new(&mogp[WmoGroup::HEADER_SIZE..])
            .map(|c| c.unwrap().0)
            .collect();
        assert_eq!(tags, vec![MOPY, MOVI, MOVT, MONR, MOTV, MOBA, MOBN, MOBR]);
    }

    #[test]
    fn test_optional_chunks_and_color_order() {
        let mut group = sample_group();
        group.colors = Some(vec![[10, 20, 30, 40]; 3]);
        group.doodad_refs = vec![0, 1];
        let bytes = group.to_bytes();
        let (_, _, rest) = unwrap(&bytes).unwrap();
        let (_, mogp, _) = unwrap(rest).unwrap();
        let chunks: Vec<(ChunkTag, &[u8])> = ChunkReader::new(&mogp[WmoGroup::HEADER_SIZE..])
            .map(|c| c.unwrap())
            .collect();

        let (tag, modr) = chunks[6];
        assert_eq!(tag, MODR);
        assert_eq!(modr, &[0, 0, 1, 0]);

        let (tag, mocv) = *chunks.last().unwrap();
        assert_eq!(tag, MOCV);
        assert_eq!(&mocv[0..4], &[30, 20, 10, 40]);
    }

    #[test]
    fn test_batch_and_node_layout() {
        let batch = sample_group().batches[0].to_bytes();
        assert_eq!(&batch[0..2], &0i16.to_le_bytes());
        assert_eq!(&batch[6..8], &1i16.to_le_bytes());
        assert_eq!(&batch[16..18], &3u16.to_le_bytes());
        assert_eq!(batch[23], 4);

        let node = BspNode::leaf(7, 2).to_bytes();
        assert_eq!(&node[0..2], &4u16.to_le_bytes());
        assert_eq!(&node[2..4], &(-1i16).to_le_bytes());
        assert_eq!(&node[6..8], &2u16.to_le_bytes());
        assert_eq!(&node[8..12], &7u32.to_le_bytes());
    }
}
