//! M2 model file (`.m2`)
//!
//! Static doodad models: one bone, one stand sequence, no animation tracks.
//! Every array offset is relative to the start of the `.m2` file.
//!
//! # Layout
//! ```text
//! 0x000: magic "MD20"
//! 0x004: version u32 (264)
//! 0x008: name (count, offset)
//! 0x010: flags u32
//! 0x014: global loops, sequences, sequence lookup, bones, key bone lookup,
//!        vertices                                     (count, offset) x6
//! 0x044: skin profile count u32
//! 0x048: colors, textures, texture weights, texture transforms,
//!        replaceable texture lookup, materials, bone lookup, texture lookup,
//!        texture unit lookup, transparency lookup, transform lookup
//!                                                     (count, offset) x11
//! 0x0A0: bounding box f32 x6, bounding radius f32
//! 0x0BC: collision box f32 x6, collision radius f32
//! 0x0D8: collision triangles, collision vertices, collision normals,
//!        attachments, attachment lookup, events, lights, cameras,
//!        camera lookup, ribbon emitters, particle emitters
//!                                                     (count, offset) x11
//! 0x130: array data, each array aligned to 16
//! ```

use glam::{Vec2, Vec3};

use super::arena::ByteArena;
use super::offset_array::{OFFSET_ARRAY_HEADER_SIZE, OffsetArray};
use super::serialization::{OffsetRecord, nul_terminated};
use crate::bounds::BoundingBox;

pub const M2_MAGIC: [u8; 4] = *b"MD20";
pub const M2_VERSION: u32 = 264;
pub const M2_HEADER_SIZE: usize = 0x130;

/// Alignment between consecutive arrays in the data section
pub const M2_DATA_ALIGNMENT: usize = 16;

/// Texture type for textures referenced by filename
pub const TEXTURE_TYPE_FILENAME: u32 = 0;

/// Placeholder for arrays this writer always leaves empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoRecord {}

impl OffsetRecord for NoRecord {
    fn header_size(&self) -> usize {
        match *self {}
    }

    fn write_header(&self, _out: &mut Vec<u8>) {
        match *self {}
    }
}

/// Model vertex (48 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct M2Vertex {
    pub position: Vec3,
    pub bone_weights: [u8; 4],
    pub bone_indices: [u8; 4],
    pub normal: Vec3,
    pub uvs: [Vec2; 2],
}

impl M2Vertex {
    pub const SIZE: usize = 48;

    /// Vertex fully weighted to bone 0
    pub fn rigid(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            bone_weights: [255, 0, 0, 0],
            bone_indices: [0; 4],
            normal,
            uvs: [uv, Vec2::ZERO],
        }
    }
}

impl OffsetRecord for M2Vertex {
    fn header_size(&self) -> usize {
        Self::SIZE
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(bytemuck::bytes_of(&self.position));
        out.extend_from_slice(&self.bone_weights);
        out.extend_from_slice(&self.bone_indices);
        out.extend_from_slice(bytemuck::bytes_of(&self.normal));
        out.extend_from_slice(bytemuck::cast_slice::<Vec2, u8>(&self.uvs));
    }
}

/// Texture entry whose filename is stored elsewhere in the file
#[derive(Debug, Clone, PartialEq)]
pub struct M2Texture {
    pub kind: u32,
    pub flags: u32,
    pub filename: OffsetArray<u8>,
}

impl M2Texture {
    pub fn from_path(path: &str) -> Self {
        Self {
            kind: TEXTURE_TYPE_FILENAME,
            flags: 0,
            filename: OffsetArray::new(nul_terminated(path)),
        }
    }
}

impl OffsetRecord for M2Texture {
    const NESTED: bool = true;

    fn header_size(&self) -> usize {
        8 + OFFSET_ARRAY_HEADER_SIZE
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.filename.header_bytes());
    }

    fn append_payload(&mut self, arena: &mut ByteArena) {
        self.filename.append_and_resolve(arena);
    }
}

/// Render flags and blend mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct M2Material {
    pub flags: u16,
    pub blend_mode: u16,
}

impl OffsetRecord for M2Material {
    fn header_size(&self) -> usize {
        4
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.blend_mode.to_le_bytes());
    }
}

/// Bone with no animation tracks (88 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct M2Bone {
    pub key_bone_id: i32,
    pub parent: i16,
    pub pivot: Vec3,
}

impl M2Bone {
    pub const SIZE: usize = 88;

    pub fn root() -> Self {
        Self {
            key_bone_id: -1,
            parent: -1,
            pivot: Vec3::ZERO,
        }
    }
}

impl OffsetRecord for M2Bone {
    fn header_size(&self) -> usize {
        Self::SIZE
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.key_bone_id.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // flags
        out.extend_from_slice(&self.parent.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // submesh
        out.extend_from_slice(&0u32.to_le_bytes()); // name crc
        for _ in 0..3 {
            // translation, rotation, scale: no interpolation, no global sequence
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(-1i16).to_le_bytes());
            out.extend_from_slice(&[0; 2 * OFFSET_ARRAY_HEADER_SIZE]);
        }
        out.extend_from_slice(bytemuck::bytes_of(&self.pivot));
    }
}

/// Animation sequence entry (64 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct M2Sequence {
    pub animation_id: u16,
    pub duration_ms: u32,
    pub flags: u32,
    pub bounds: BoundingBox,
    pub radius: f32,
}

impl M2Sequence {
    pub const SIZE: usize = 64;
    /// Loops forever, not blended
    pub const FLAG_LOOPED: u32 = 0x20;
    const FREQUENCY_ALWAYS: i16 = 0x7FFF;

    /// Looping stand sequence covering `bounds`
    pub fn stand(bounds: BoundingBox) -> Self {
        Self {
            animation_id: 0,
            duration_ms: 3000,
            flags: Self::FLAG_LOOPED,
            bounds,
            radius: bounds.sphere_radius(),
        }
    }
}

impl OffsetRecord for M2Sequence {
    fn header_size(&self) -> usize {
        Self::SIZE
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.animation_id.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // variation
        out.extend_from_slice(&self.duration_ms.to_le_bytes());
        out.extend_from_slice(&0f32.to_le_bytes()); // move speed
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&Self::FREQUENCY_ALWAYS.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // padding
        out.extend_from_slice(&0u32.to_le_bytes()); // replay min
        out.extend_from_slice(&0u32.to_le_bytes()); // replay max
        out.extend_from_slice(&150u32.to_le_bytes()); // blend time
        out.extend_from_slice(&self.bounds.to_bytes());
        out.extend_from_slice(&self.radius.to_le_bytes());
        out.extend_from_slice(&(-1i16).to_le_bytes()); // next variation
        out.extend_from_slice(&0u16.to_le_bytes()); // alias
    }
}

/// M2 model contents
#[derive(Debug, Clone, Default)]
pub struct M2Model {
    pub name: OffsetArray<u8>,
    pub flags: u32,
    pub global_loops: OffsetArray<u32>,
    pub sequences: OffsetArray<M2Sequence>,
    pub sequence_lookup: OffsetArray<i16>,
    pub bones: OffsetArray<M2Bone>,
    pub key_bone_lookup: OffsetArray<i16>,
    pub vertices: OffsetArray<M2Vertex>,
    pub skin_profile_count: u32,
    pub colors: OffsetArray<NoRecord>,
    pub textures: OffsetArray<M2Texture>,
    pub texture_weights: OffsetArray<NoRecord>,
    pub texture_transforms: OffsetArray<NoRecord>,
    pub replaceable_texture_lookup: OffsetArray<i16>,
    pub materials: OffsetArray<M2Material>,
    pub bone_lookup: OffsetArray<i16>,
    pub texture_lookup: OffsetArray<i16>,
    pub texture_unit_lookup: OffsetArray<i16>,
    pub transparency_lookup: OffsetArray<i16>,
    pub texture_transform_lookup: OffsetArray<i16>,
    pub bounds: BoundingBox,
    pub bounds_radius: f32,
    pub collision_bounds: BoundingBox,
    pub collision_radius: f32,
    pub collision_triangles: OffsetArray<u16>,
    pub collision_vertices: OffsetArray<Vec3>,
    pub collision_normals: OffsetArray<Vec3>,
    pub attachments: OffsetArray<NoRecord>,
    pub attachment_lookup: OffsetArray<i16>,
    pub events: OffsetArray<NoRecord>,
    pub lights: OffsetArray<NoRecord>,
    pub cameras: OffsetArray<NoRecord>,
    pub camera_lookup: OffsetArray<i16>,
    pub ribbon_emitters: OffsetArray<NoRecord>,
    pub particle_emitters: OffsetArray<NoRecord>,
}

impl M2Model {
    /// Serialize: reserve the header, append every array, backpatch the header.
    pub fn to_bytes(mut self) -> Vec<u8> {
        let mut arena = ByteArena::new();
        let header_slot = arena.reserve(M2_HEADER_SIZE);

        macro_rules! append_arrays {
            ($model:expr, $arena:expr; $($field:ident),* $(,)?) => {
                $(
                    $model.$field.append_and_resolve($arena);
                    $arena.align(M2_DATA_ALIGNMENT);
                )*
            };
        }
        append_arrays!(
            self, &mut arena;
            name,
            global_loops,
            sequences,
            sequence_lookup,
            bones,
            key_bone_lookup,
            vertices,
            colors,
            textures,
            texture_weights,
            texture_transforms,
            replaceable_texture_lookup,
            materials,
            bone_lookup,
            texture_lookup,
            texture_unit_lookup,
            transparency_lookup,
            texture_transform_lookup,
            collision_triangles,
            collision_vertices,
            collision_normals,
            attachments,
            attachment_lookup,
            events,
            lights,
            cameras,
            camera_lookup,
            ribbon_emitters,
            particle_emitters,
        );

        let header = self.header_bytes();
        arena.commit(header_slot, &header);
        arena.into_bytes()
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(M2_HEADER_SIZE);
        out.extend_from_slice(&M2_MAGIC);
        out.extend_from_slice(&M2_VERSION.to_le_bytes());
        out.extend_from_slice(&self.name.header_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.global_loops.header_bytes());
        out.extend_from_slice(&self.sequences.header_bytes());
        out.extend_from_slice(&self.sequence_lookup.header_bytes());
        out.extend_from_slice(&self.bones.header_bytes());
        out.extend_from_slice(&self.key_bone_lookup.header_bytes());
        out.extend_from_slice(&self.vertices.header_bytes());
        out.extend_from_slice(&self.skin_profile_count.to_le_bytes());
        out.extend_from_slice(&self.colors.header_bytes());
        out.extend_from_slice(&self.textures.header_bytes());
        out.extend_from_slice(&self.texture_weights.header_bytes());
        out.extend_from_slice(&self.texture_transforms.header_bytes());
        out.extend_from_slice(&self.replaceable_texture_lookup.header_bytes());
        out.extend_from_slice(&self.materials.header_bytes());
        out.extend_from_slice(&self.bone_lookup.header_bytes());
        out.extend_from_slice(&self.texture_lookup.header_bytes());
        out.extend_from_slice(&self.texture_unit_lookup.header_bytes());
        out.extend_from_slice(&self.transparency_lookup.header_bytes());
        out.extend_from_slice(&self.texture_transform_lookup.header_bytes());
        out.extend_from_slice(&self.bounds.to_bytes());
        out.extend_from_slice(&self.bounds_radius.to_le_bytes());
        out.extend_from_slice(&self.collision_bounds.to_bytes());
        out.extend_from_slice(&self.collision_radius.to_le_bytes());
        out.extend_from_slice(&self.collision_triangles.header_bytes());
        out.extend_from_slice(&self.collision_vertices.header_bytes());
        out.extend_from_slice(&self.collision_normals.header_bytes());
        out.extend_from_slice(&self.attachments.header_bytes());
        out.extend_from_slice(&self.attachment_lookup.header_bytes());
        out.extend_from_slice(&self.events.header_bytes());
        out.extend_from_slice(&self.lights.header_bytes());
        out.extend_from_slice(&self.cameras.header_bytes());
        out.extend_from_slice(&self.camera_lookup.header_bytes());
        out.extend_from_slice(&self.ribbon_emitters.header_bytes());
        out.extend_from_slice(&self.particle_emitters.header_bytes());
        debug_assert_eq!(out.len(), M2_HEADER_SIZE);
        out
    }
}
