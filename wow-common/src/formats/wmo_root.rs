//! WMO root file (`<zone>.wmo`)
//!
//! The root lists materials, textures, group summaries and doodad
//! placements. Geometry lives in the group files.
//!
//! # Layout
//! ```text
//! MVER  version u32 (17)
//! MOHD  64-byte header
//! MOTX  NUL-terminated texture paths, each padded to 4, 4 trailing NULs
//! MOMT  64 bytes per material
//! MOGN  "\0\0", group name, descriptive name, padded to 4
//! MOGI  32 bytes per group (flags, box, name offset)
//! MOSB  skybox name (empty)
//! MOPV, MOPT, MOPR, MOVV, MOVB, MOLT   (empty)
//! MODS  one global doodad set
//! MODN  NUL-terminated doodad model paths
//! MODD  40 bytes per doodad placement
//! MFOG  48 bytes per fog (one default entry)
//! ```

use glam::{Quat, Vec3};
use hashbrown::HashMap;

use super::chunk::{ChunkTag, ChunkWriter};
use super::serialization::{nul_terminated, pad_to};
use super::wmo_group::{MVER, WMO_VERSION};
use crate::bounds::BoundingBox;

pub const MOHD: ChunkTag = ChunkTag::from_bytes(*b"MOHD");
pub const MOTX: ChunkTag = ChunkTag::from_bytes(*b"MOTX");
pub const MOMT: ChunkTag = ChunkTag::from_bytes(*b"MOMT");
pub const MOGN: ChunkTag = ChunkTag::from_bytes(*b"MOGN");
pub const MOGI: ChunkTag = ChunkTag::from_bytes(*b"MOGI");
pub const MOSB: ChunkTag = ChunkTag::from_bytes(*b"MOSB");
pub const MOPV: ChunkTag = ChunkTag::from_bytes(*b"MOPV");
pub const MOPT: ChunkTag = ChunkTag::from_bytes(*b"MOPT");
pub const MOPR: ChunkTag = ChunkTag::from_bytes(*b"MOPR");
pub const MOVV: ChunkTag = ChunkTag::from_bytes(*b"MOVV");
pub const MOVB: ChunkTag = ChunkTag::from_bytes(*b"MOVB");
pub const MOLT: ChunkTag = ChunkTag::from_bytes(*b"MOLT");
pub const MODS: ChunkTag = ChunkTag::from_bytes(*b"MODS");
pub const MODN: ChunkTag = ChunkTag::from_bytes(*b"MODN");
pub const MODD: ChunkTag = ChunkTag::from_bytes(*b"MODD");
pub const MFOG: ChunkTag = ChunkTag::from_bytes(*b"MFOG");

/// MOHD flags: unified rendering path, liquid type from DBC, keep vertex color alpha
pub const ROOT_FLAGS: u32 = 0x2 | 0x4 | 0x8;

const DEFAULT_DOODAD_SET: &[u8; 20] = b"Set_$DefaultGlobal\0\0";
const DIFFUSE_COLOR: [u8; 4] = [149, 149, 149, 255];
const EMISSIVE_COLOR: [u8; 4] = [0, 0, 0, 255];
const TERRAIN_TYPE_GRASS: u32 = 6;

/// Material entry as written to MOMT
#[derive(Debug, Clone, PartialEq)]
pub struct WmoMaterial {
    /// Full texture path, `None` for untextured materials
    pub texture: Option<String>,
    pub blend_mode: u32,
}

/// MOGI summary of one group file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WmoGroupInfo {
    pub flags: u32,
    pub bounds: BoundingBox,
}

/// Placement of a doodad model
#[derive(Debug, Clone, PartialEq)]
pub struct DoodadPlacement {
    pub model_path: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
    /// RGBA
    pub color: [u8; 4],
}

/// Group names stored in MOGN and the offsets group headers refer to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNameTable {
    pub bytes: Vec<u8>,
    pub name_offset: u32,
    pub descriptive_offset: u32,
}

impl GroupNameTable {
    pub fn new(name: &str, descriptive_name: &str) -> Self {
        let mut bytes = vec![0u8; 2];
        let name_offset = bytes.len() as u32;
        bytes.extend(nul_terminated(name));
        let descriptive_offset = bytes.len() as u32;
        bytes.extend(nul_terminated(descriptive_name));
        pad_to(&mut bytes, 4);
        Self {
            bytes,
            name_offset,
            descriptive_offset,
        }
    }
}

/// Texture path table (MOTX) with the offset of each distinct path
#[derive(Debug, Clone, Default)]
pub struct TextureTable {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl TextureTable {
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut table = Self::default();
        for path in paths {
            if table.offsets.contains_key(path) {
                continue;
            }
            table.offsets.insert(path.to_string(), table.bytes.len() as u32);
            table.bytes.extend(nul_terminated(path));
            pad_to(&mut table.bytes, 4);
        }
        table.bytes.extend_from_slice(&[0; 4]);
        table
    }

    pub fn offset_of(&self, path: &str) -> Option<u32> {
        self.offsets.get(path).copied()
    }

    /// Offset of the trailing NULs, read as an empty path
    pub fn empty_offset(&self) -> u32 {
        self.bytes.len().saturating_sub(4) as u32
    }

    /// Number of distinct texture paths
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Root file contents
#[derive(Debug, Clone)]
pub struct WmoRoot {
    pub wmo_id: u32,
    pub names: GroupNameTable,
    pub bounds: BoundingBox,
    /// RGBA
    pub ambient_color: [u8; 4],
    pub materials: Vec<WmoMaterial>,
    pub groups: Vec<WmoGroupInfo>,
    pub doodads: Vec<DoodadPlacement>,
}

impl WmoRoot {
    pub const HEADER_SIZE: usize = 64;
    pub const MATERIAL_SIZE: usize = 64;
    pub const GROUP_INFO_SIZE: usize = 32;
    pub const DOODAD_SIZE: usize = 40;
    pub const FOG_SIZE: usize = 48;

    pub fn to_bytes(&self) -> Vec<u8> {
        let textures = TextureTable::new(self.materials.iter().filter_map(|m| m.texture.as_deref()));
        let (doodad_names, doodad_name_offsets) = self.doodad_name_table();

        let mut writer = ChunkWriter::new();
        writer
            .chunk(MVER, &WMO_VERSION.to_le_bytes())
            .chunk(MOHD, &self.header_bytes(&textures, doodad_name_offsets.len()))
            .chunk(MOTX, textures.bytes())
            .chunk(MOMT, &self.material_bytes(&textures))
            .chunk(MOGN, &self.names.bytes)
            .chunk(MOGI, &self.group_info_bytes())
            .chunk(MOSB, &[0; 4]);
        for tag in [MOPV, MOPT, MOPR, MOVV, MOVB, MOLT] {
            writer.chunk(tag, &[]);
        }
        writer
            .chunk(MODS, &self.doodad_set_bytes())
            .chunk(MODN, &doodad_names)
            .chunk(MODD, &self.doodad_bytes(&doodad_name_offsets))
            .chunk(MFOG, &default_fog_bytes());
        writer.finish()
    }

    fn header_bytes(&self, textures: &TextureTable, doodad_name_count: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_SIZE);
        for count in [
            textures.len(),
            self.groups.len(),
            0, // portals
            0, // lights
            doodad_name_count,
            self.doodads.len(),
            1, // doodad sets
        ] {
            out.extend_from_slice(&(count as u32).to_le_bytes());
        }
        out.extend_from_slice(&rgba_to_bgra(self.ambient_color));
        out.extend_from_slice(&self.wmo_id.to_le_bytes());
        out.extend_from_slice(&self.bounds.to_bytes());
        out.extend_from_slice(&ROOT_FLAGS.to_le_bytes());
        out
    }

    fn material_bytes(&self, textures: &TextureTable) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.materials.len() * Self::MATERIAL_SIZE);
        for material in &self.materials {
            let texture_offset = material
                .texture
                .as_deref()
                .and_then(|t| textures.offset_of(t))
                .unwrap_or_else(|| textures.empty_offset());
            out.extend_from_slice(&0u32.to_le_bytes()); // flags
            out.extend_from_slice(&0u32.to_le_bytes()); // shader: diffuse
            out.extend_from_slice(&material.blend_mode.to_le_bytes());
            out.extend_from_slice(&texture_offset.to_le_bytes());
            out.extend_from_slice(&EMISSIVE_COLOR);
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes()); // second texture
            out.extend_from_slice(&DIFFUSE_COLOR);
            out.extend_from_slice(&TERRAIN_TYPE_GRASS.to_le_bytes());
            // third texture, its color, flags, and four runtime words
            out.extend_from_slice(&[0; 28]);
        }
        out
    }

    fn group_info_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.groups.len() * Self::GROUP_INFO_SIZE);
        for group in &self.groups {
            out.extend_from_slice(&group.flags.to_le_bytes());
            out.extend_from_slice(&group.bounds.to_bytes());
            out.extend_from_slice(&self.names.name_offset.to_le_bytes());
        }
        out
    }

    fn doodad_set_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.extend_from_slice(DEFAULT_DOODAD_SET);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(self.doodads.len() as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out
    }

    /// MODN bytes and the offset of each distinct model path
    fn doodad_name_table(&self) -> (Vec<u8>, HashMap<&str, u32>) {
        let mut bytes = Vec::new();
        let mut offsets = HashMap::new();
        for doodad in &self.doodads {
            let path = doodad.model_path.as_str();
            if !offsets.contains_key(path) {
                offsets.insert(path, bytes.len() as u32);
                bytes.extend(nul_terminated(path));
            }
        }
        (bytes, offsets)
    }

    fn doodad_bytes(&self, name_offsets: &HashMap<&str, u32>) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.doodads.len() * Self::DOODAD_SIZE);
        for doodad in &self.doodads {
            // name offset is 24 bits, the top byte holds flags (none set)
            let name_offset = name_offsets
                .get(doodad.model_path.as_str())
                .copied()
                .unwrap_or(0)
                & 0x00FF_FFFF;
            out.extend_from_slice(&name_offset.to_le_bytes());
            out.extend_from_slice(bytemuck::bytes_of(&doodad.position));
            out.extend_from_slice(bytemuck::bytes_of(&doodad.rotation.to_array()));
            out.extend_from_slice(&doodad.scale.to_le_bytes());
            out.extend_from_slice(&rgba_to_bgra(doodad.color));
        }
        out
    }
}

fn rgba_to_bgra([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    [b, g, r, a]
}

fn default_fog_bytes() -> Vec<u8> {
    let mut out = Vec::with_capacity(WmoRoot::FOG_SIZE);
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&[0; 12]); // position
    out.extend_from_slice(&0f32.to_le_bytes()); // near radius
    out.extend_from_slice(&0f32.to_le_bytes()); // far radius
    out.extend_from_slice(&444.4445f32.to_le_bytes());
    out.extend_from_slice(&0.25f32.to_le_bytes());
    out.extend_from_slice(&[255; 4]);
    out.extend_from_slice(&222.2222f32.to_le_bytes());
    out.extend_from_slice(&(-0.5f32).to_le_bytes());
    out.extend_from_slice(&[255; 4]);
    out
}
