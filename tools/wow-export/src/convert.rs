//! Scene to WMO / M2 conversion
//!
//! 1. Triangles of frame-animated materials are set aside as doodads, one
//!    model per material.
//! 2. The rest is partitioned with the configured strategy.
//! 3. Doodad models and groups are built on rayon workers.
//! 4. Ids are reserved in partition order once every build succeeded.
//! 5. The root file ties groups, materials and doodad placements together.
//!
//! Nothing reaches the [`OutputSink`] until every buffer is complete.

use anyhow::{Context, Result, bail};
use glam::{Quat, Vec3};
use hashbrown::HashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::PathBuf;

use wow_common::formats::wmo_group::{NON_RENDERABLE_MATERIAL, group_flags};
use wow_common::formats::{
    DoodadPlacement, FormatError, GroupNameTable, M2Bone, M2Material, M2Model, M2Sequence,
    M2Skin, M2Texture, M2Vertex, OffsetArray, SKIN_EXT, SkinBoneIndices, SkinSubmesh,
    SkinTextureUnit, WMO_EXT, WmoBatch, WmoGroup, WmoGroupInfo, WmoMaterial, WmoRoot, M2_EXT,
    nul_terminated, to_u8, to_u16,
};
use wow_common::{BoundingBox, Material, MaterialKind};

use crate::collision::CollisionTree;
use crate::ids::IdAllocator;
use crate::partition::{
    DEFAULT_MAX_TRIANGLES, Diagnostic, MeshPartition, PartitionLimits, PartitionStrategy,
    Partitioner, RenderBatch,
};
use crate::scene::{OutputSink, Scene};

pub const DEFAULT_WMO_ID: u32 = 7000;
pub const DEFAULT_FIRST_GROUP_ID: u32 = 30000;
/// Padding added around each group box
pub const DEFAULT_BOUNDS_PADDING: f32 = 1.0;
/// Subdirectory for doodad models
pub const DOODAD_DIR: &str = "doodads";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Short name, used for file names and paths
    pub zone_name: String,
    pub descriptive_name: String,
    pub strategy: PartitionStrategy,
    pub limits: PartitionLimits,
    /// Client directory holding zone textures
    pub texture_root: String,
    /// Client directory holding doodad models
    pub object_root: String,
    pub bounds_padding: f32,
    /// RGBA
    pub ambient_color: [u8; 4],
}

impl ExportOptions {
    pub fn new(zone_name: impl Into<String>) -> Self {
        let zone_name = zone_name.into();
        let upper = zone_name.to_uppercase();
        Self {
            descriptive_name: zone_name.clone(),
            texture_root: format!("WORLD\\ZONES\\{upper}\\TEXTURES"),
            object_root: format!("WORLD\\ZONES\\{upper}\\DOODADS"),
            zone_name,
            strategy: PartitionStrategy::default(),
            limits: PartitionLimits::u16_indexed(DEFAULT_MAX_TRIANGLES),
            bounds_padding: DEFAULT_BOUNDS_PADDING,
            ambient_color: [128, 128, 128, 255],
        }
    }

    /// Client path of a texture: `<root>\<NAME>.BLP`, any extension dropped
    pub fn texture_path(&self, texture: &str) -> String {
        let stem = texture.rsplit_once('.').map_or(texture, |(stem, _)| stem);
        format!("{}\\{}.BLP", self.texture_root, stem.to_uppercase())
    }

    /// Client path of a doodad model as referenced from the root file
    pub fn model_path(&self, model: &str) -> String {
        let upper = model.to_uppercase();
        format!("{}\\{upper}\\{upper}.MDX", self.object_root)
    }

    pub fn group_file_name(&self, index: usize) -> String {
        format!("{}_{index:03}.{WMO_EXT}", self.zone_name)
    }

    pub fn doodad_name(&self, index: usize) -> String {
        format!("{}_doodad_{index:03}", self.zone_name)
    }
}

/// Id counters for one run
#[derive(Debug)]
pub struct ExportIds {
    pub wmo: IdAllocator,
    pub groups: IdAllocator,
}

impl ExportIds {
    pub fn new(first_wmo_id: u32, first_group_id: u32) -> Self {
        Self {
            wmo: IdAllocator::new(first_wmo_id),
            groups: IdAllocator::new(first_group_id),
        }
    }
}

impl Default for ExportIds {
    fn default() -> Self {
        Self::new(DEFAULT_WMO_ID, DEFAULT_FIRST_GROUP_ID)
    }
}

/// A finished file, relative to the output root
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ConvertedZone {
    /// Root file first, then groups in order, then doodad models
    pub files: Vec<OutputFile>,
    pub diagnostics: Vec<Diagnostic>,
    pub wmo_id: u32,
    pub group_ids: Range<u32>,
    pub doodad_count: usize,
}

impl ConvertedZone {
    pub fn group_count(&self) -> usize {
        self.group_ids.len()
    }
}

/// Convert `scene` and hand every file to `sink`
pub fn export_scene(
    scene: &Scene,
    options: &ExportOptions,
    ids: &ExportIds,
    sink: &mut dyn OutputSink,
) -> Result<ConvertedZone> {
    let converted = convert_scene(scene, options, ids)?;
    for file in &converted.files {
        sink.write(&file.path, &file.bytes)
            .with_context(|| format!("Failed to write {:?}", file.path))?;
    }
    tracing::info!(
        "Exported zone '{}': {} groups, {} doodads, {} files",
        options.zone_name,
        converted.group_count(),
        converted.doodad_count,
        converted.files.len()
    );
    Ok(converted)
}

/// Build every output buffer for `scene` without writing anything
pub fn convert_scene(scene: &Scene, options: &ExportOptions, ids: &ExportIds) -> Result<ConvertedZone> {
    scene
        .attributes
        .validate()
        .context("Scene vertex attributes are inconsistent")?;
    let partitioner = Partitioner::new(options.limits).context("Invalid partition limits")?;
    let materials = scene.material_map();

    let (doodad_triangles, zone_triangles): (Vec<usize>, Vec<usize>) =
        (0..scene.triangles.len()).partition(|&t| {
            u32::try_from(scene.triangles[t].material)
                .ok()
                .and_then(|m| materials.get(&m))
                .is_some_and(|m| m.is_animated())
        });

    let zone = partitioner.partition_subset(scene, &zone_triangles, options.strategy);
    let mut diagnostics = zone.diagnostics;

    // One model per animated material, each with that material's frames
    let mut by_material: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for &t in &doodad_triangles {
        by_material.entry(scene.triangles[t].material).or_default().push(t);
    }
    let mut doodad_partitions = Vec::new();
    for triangles in by_material.values() {
        let output = partitioner.partition_subset(scene, triangles, PartitionStrategy::ByMaterial);
        doodad_partitions.extend(output.partitions);
        diagnostics.extend(output.diagnostics);
    }
    tracing::info!(
        "Partitioned zone '{}': {} triangles into {} groups, {} doodad triangles into {} models",
        options.zone_name,
        zone_triangles.len(),
        zone.partitions.len(),
        doodad_triangles.len(),
        doodad_partitions.len()
    );
    let group_count = u32::try_from(zone.partitions.len()).context("Too many groups")?;

    let models: Vec<DoodadModel> = doodad_partitions
        .par_iter()
        .enumerate()
        .map(|(index, partition)| {
            build_doodad(index, partition, &materials, options)
                .with_context(|| format!("Failed to build doodad {}", options.doodad_name(index)))
        })
        .collect::<Result<_>>()?;

    let names = GroupNameTable::new(&options.zone_name, &options.descriptive_name);
    let context = GroupContext {
        options,
        names: &names,
        slots: scene.material_slots(),
        materials: &materials,
        doodad_bounds: models.iter().map(|m| m.bounds).collect(),
    };
    let groups: Vec<BuiltGroup> = zone
        .partitions
        .into_par_iter()
        .enumerate()
        .map(|(index, partition)| {
            context
                .build_group(index, partition)
                .with_context(|| format!("Failed to build {}", options.group_file_name(index)))
        })
        .collect::<Result<_>>()?;
    drop(context);

    // Ids are taken only after every fallible step
    let wmo_id = ids.wmo.next_id();
    let group_ids = ids.groups.reserve(group_count);

    let mut files = Vec::with_capacity(1 + groups.len() + models.len() * 2);
    let mut infos = Vec::with_capacity(groups.len());
    let mut wmo_groups = Vec::with_capacity(groups.len());
    for group in groups {
        diagnostics.extend(group.diagnostics);
        infos.push(group.info);
        wmo_groups.push(group.group);
    }
    let group_files: Vec<OutputFile> = wmo_groups
        .into_par_iter()
        .zip(group_ids.clone())
        .enumerate()
        .map(|(index, (mut group, group_id))| {
            group.group_id = group_id;
            OutputFile {
                path: PathBuf::from(options.group_file_name(index)),
                bytes: group.to_bytes(),
            }
        })
        .collect();

    let bounds = infos
        .iter()
        .map(|info| info.bounds)
        .chain(models.iter().map(|m| m.bounds))
        .reduce(|a, b| a.union(&b))
        .unwrap_or_default();
    let root = WmoRoot {
        wmo_id,
        names,
        bounds,
        ambient_color: options.ambient_color,
        materials: scene
            .materials
            .iter()
            .map(|m| WmoMaterial {
                texture: m.textures.first().map(|t| options.texture_path(t)),
                blend_mode: m.kind.blend_mode(),
            })
            .collect(),
        groups: infos,
        doodads: models.iter().map(|m| m.placement.clone()).collect(),
    };
    files.push(OutputFile {
        path: PathBuf::from(format!("{}.{WMO_EXT}", options.zone_name)),
        bytes: root.to_bytes(),
    });
    files.extend(group_files);
    let doodad_count = models.len();
    for model in models {
        files.extend(model.files);
    }

    for diagnostic in &diagnostics {
        tracing::warn!("{}: {}", options.zone_name, diagnostic);
    }

    Ok(ConvertedZone {
        files,
        diagnostics,
        wmo_id,
        group_ids,
        doodad_count,
    })
}

/// Group awaiting its id
struct BuiltGroup {
    group: WmoGroup,
    info: WmoGroupInfo,
    diagnostics: Vec<Diagnostic>,
}

/// Read-only state shared by group workers
struct GroupContext<'a> {
    options: &'a ExportOptions,
    names: &'a GroupNameTable,
    /// Material index -> MOMT position
    slots: HashMap<u32, usize>,
    materials: &'a HashMap<u32, &'a Material>,
    doodad_bounds: Vec<BoundingBox>,
}

impl GroupContext<'_> {
    fn build_group(&self, index: usize, partition: MeshPartition) -> Result<BuiltGroup> {
        to_u16("group vertex count", partition.vertex_count())?;
        let mut diagnostics = Vec::new();

        let face_materials = partition
            .triangles
            .iter()
            .map(|t| self.material_id(t.material as u32))
            .collect::<Result<Vec<u8>, FormatError>>()?;

        let mut batches = Vec::with_capacity(partition.batches.len());
        for batch in &partition.batches {
            let material = self.material_id(batch.material)?;
            if material == NON_RENDERABLE_MATERIAL {
                diagnostics.push(Diagnostic::NotRendered {
                    partition: index,
                    material: batch.material,
                    triangles: batch.triangle_count() as usize,
                });
                continue;
            }
            batches.push(wmo_batch(batch, material)?);
        }

        let tree = CollisionTree::build(&partition.attributes.positions, &partition.triangles)?;
        let bsp_faces = tree.face_indices_u16()?;

        let bounds = partition.bounds.padded(self.options.bounds_padding);
        let doodad_refs = self
            .doodad_bounds
            .iter()
            .enumerate()
            .filter(|(_, b)| b.intersects(&bounds))
            .map(|(i, _)| to_u16("doodad reference", i))
            .collect::<Result<Vec<u16>, FormatError>>()?;

        let attributes = partition.attributes;
        let mut flags = group_flags::HAS_BSP_TREE | group_flags::IS_OUTDOORS;
        if attributes.colors.is_some() {
            flags |= group_flags::HAS_VERTEX_COLORS;
        }
        if !doodad_refs.is_empty() {
            flags |= group_flags::HAS_DOODADS;
        }

        let group = WmoGroup {
            name_offset: self.names.name_offset,
            descriptive_name_offset: self.names.descriptive_offset,
            flags,
            bounds,
            group_id: 0,
            faces: partition
                .triangles
                .iter()
                .map(|t| t.indices.map(|i| i as u16))
                .collect(),
            positions: attributes.positions,
            normals: attributes.normals,
            uvs: attributes.uvs,
            colors: attributes.colors,
            face_materials,
            batches,
            doodad_refs,
            bsp_nodes: tree.nodes,
            bsp_faces,
        };
        tracing::debug!(
            "Group {}: {} triangles, {} vertices, {} batches, {} collision nodes",
            index,
            group.faces.len(),
            group.positions.len(),
            group.batches.len(),
            group.bsp_nodes.len()
        );

        Ok(BuiltGroup {
            group,
            info: WmoGroupInfo { flags, bounds },
            diagnostics,
        })
    }

    /// MOMT position of a renderable material, or the non-renderable marker
    fn material_id(&self, material: u32) -> Result<u8, FormatError> {
        let renderable = self.materials.get(&material).is_some_and(|m| m.is_renderable());
        let slot = self.slots.get(&material).copied();
        match (renderable, slot) {
            (true, Some(slot)) => {
                let id = to_u8("material slot", slot)?;
                if id == NON_RENDERABLE_MATERIAL {
                    return Err(FormatError::FieldOverflow {
                        what: "material slot",
                        value: slot,
                        max: NON_RENDERABLE_MATERIAL as usize - 1,
                    });
                }
                Ok(id)
            }
            _ => Ok(NON_RENDERABLE_MATERIAL),
        }
    }
}

fn wmo_batch(batch: &RenderBatch, material: u8) -> Result<WmoBatch, FormatError> {
    Ok(WmoBatch {
        bounds: batch.bounds.to_low_res(),
        first_index: batch.first_index,
        index_count: to_u16("batch index count", batch.index_count as usize)?,
        first_vertex: to_u16("batch first vertex", batch.min_vertex as usize)?,
        last_vertex: to_u16("batch last vertex", batch.max_vertex as usize)?,
        material,
    })
}

struct DoodadModel {
    placement: DoodadPlacement,
    bounds: BoundingBox,
    files: Vec<OutputFile>,
}

/// M2 blend mode for a material kind
fn m2_blend_mode(kind: MaterialKind) -> u16 {
    match kind {
        MaterialKind::Opaque | MaterialKind::Invisible | MaterialKind::Boundary => 0,
        MaterialKind::AlphaBlended => 2,
        MaterialKind::Additive => 4,
    }
}

fn build_doodad(
    index: usize,
    partition: &MeshPartition,
    materials: &HashMap<u32, &Material>,
    options: &ExportOptions,
) -> Result<DoodadModel> {
    let Some(material) = partition
        .triangles
        .first()
        .and_then(|t| materials.get(&(t.material as u32)))
    else {
        bail!("Doodad partition {} has no material", index);
    };
    let vertex_count = to_u16("doodad vertex count", partition.vertex_count())?;
    let name = options.doodad_name(index);
    let attributes = &partition.attributes;
    let positions = &attributes.positions;

    let vertices: Vec<M2Vertex> = positions
        .iter()
        .zip(&attributes.normals)
        .zip(&attributes.uvs)
        .map(|((&p, &n), &uv)| M2Vertex::rigid(p, n, uv))
        .collect();
    let triangle_indices: Vec<u16> = partition
        .triangles
        .iter()
        .flat_map(|t| t.indices.map(|i| i as u16))
        .collect();
    let face_normals: Vec<Vec3> = partition
        .triangles
        .iter()
        .map(|t| {
            let [a, b, c] = t.indices.map(|i| positions[i as usize]);
            (b - a).cross(c - a).normalize_or_zero()
        })
        .collect();

    let bounds = partition.bounds;
    let mut stand = M2Sequence::stand(bounds);
    if material.frame_delay_ms > 0 {
        stand.duration_ms = material.frame_delay_ms * material.textures.len() as u32;
    }
    let texture_count = to_u16("doodad texture count", material.textures.len())?;

    let model = M2Model {
        name: OffsetArray::new(nul_terminated(&name)),
        sequences: OffsetArray::new(vec![stand]),
        sequence_lookup: OffsetArray::new(vec![0]),
        bones: OffsetArray::new(vec![M2Bone::root()]),
        key_bone_lookup: OffsetArray::new(vec![-1]),
        vertices: OffsetArray::new(vertices),
        skin_profile_count: 1,
        textures: OffsetArray::new(
            material
                .textures
                .iter()
                .map(|t| M2Texture::from_path(&options.texture_path(t)))
                .collect(),
        ),
        replaceable_texture_lookup: OffsetArray::new(vec![-1]),
        materials: OffsetArray::new(vec![M2Material {
            flags: 0,
            blend_mode: m2_blend_mode(material.kind),
        }]),
        bone_lookup: OffsetArray::new(vec![0]),
        texture_lookup: OffsetArray::new((0..texture_count).map(|i| i as i16).collect()),
        texture_unit_lookup: OffsetArray::new(vec![0]),
        transparency_lookup: OffsetArray::new(vec![0]),
        texture_transform_lookup: OffsetArray::new(vec![-1]),
        bounds,
        bounds_radius: partition.radius,
        collision_bounds: bounds,
        collision_radius: partition.radius,
        collision_triangles: OffsetArray::new(triangle_indices.clone()),
        collision_vertices: OffsetArray::new(positions.clone()),
        collision_normals: OffsetArray::new(face_normals),
        ..Default::default()
    };

    let submeshes = partition
        .batches
        .iter()
        .map(|batch| skin_submesh(batch, positions))
        .collect::<Result<Vec<_>, FormatError>>()?;
    let texture_units = (0..submeshes.len())
        .map(|k| {
            Ok(SkinTextureUnit {
                submesh: to_u16("doodad submesh", k)?,
                material: 0,
                texture_lookup: 0,
            })
        })
        .collect::<Result<Vec<_>, FormatError>>()?;
    let skin = M2Skin {
        vertex_lookup: OffsetArray::new((0..vertex_count).collect()),
        triangle_indices: OffsetArray::new(triangle_indices),
        bone_indices: OffsetArray::new(vec![SkinBoneIndices::default(); vertex_count as usize]),
        submeshes: OffsetArray::new(submeshes),
        texture_units: OffsetArray::new(texture_units),
    };

    let dir = PathBuf::from(DOODAD_DIR).join(&name);
    tracing::debug!(
        "Doodad {}: {} triangles, {} textures",
        name,
        partition.triangle_count(),
        material.textures.len()
    );

    Ok(DoodadModel {
        placement: DoodadPlacement {
            model_path: options.model_path(&name),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
            color: [255; 4],
        },
        bounds,
        files: vec![
            OutputFile {
                path: dir.join(format!("{name}.{M2_EXT}")),
                bytes: model.to_bytes(),
            },
            OutputFile {
                path: dir.join(format!("{name}00.{SKIN_EXT}")),
                bytes: skin.to_bytes(),
            },
        ],
    })
}

fn skin_submesh(batch: &RenderBatch, positions: &[Vec3]) -> Result<SkinSubmesh, FormatError> {
    let range = &positions[batch.min_vertex as usize..=batch.max_vertex as usize];
    let center = range.iter().copied().sum::<Vec3>() / range.len() as f32;
    let sort_center = batch.bounds.center();
    let sort_radius = range
        .iter()
        .map(|p| p.distance(sort_center))
        .fold(0.0, f32::max);

    Ok(SkinSubmesh {
        vertex_start: to_u16("submesh vertex start", batch.min_vertex as usize)?,
        vertex_count: to_u16(
            "submesh vertex count",
            (batch.max_vertex - batch.min_vertex + 1) as usize,
        )?,
        index_start: to_u16("submesh index start", batch.first_index as usize)?,
        index_count: to_u16("submesh index count", batch.index_count as usize)?,
        center,
        sort_center,
        sort_radius,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use wow_common::formats::{ChunkReader, ChunkTag, unwrap};
    use wow_common::{Triangle, VertexAttributes};

    use crate::scene::MemorySink;

    /// `n x n` textured floor, optionally with one animated quad off to the side
    fn zone(n: u32, with_water: bool) -> Scene {
        let mut attributes = VertexAttributes::default();
        let mut triangles = Vec::new();
        let stride = n + 1;
        for y in 0..=n {
            for x in 0..=n {
                attributes.positions.push(Vec3::new(x as f32 * 8.0, y as f32 * 8.0, 0.0));
                attributes.normals.push(Vec3::Z);
                attributes.uvs.push(Vec2::new(x as f32, y as f32));
            }
        }
        for y in 0..n {
            for x in 0..n {
                let a = y * stride + x;
                triangles.push(Triangle::new([a, a + 1, a + stride], 0));
                triangles.push(Triangle::new([a + 1, a + stride + 1, a + stride], 0));
            }
        }
        let mut materials = vec![Material::new("dirt", 0, vec!["dirt.png".into()])];

        if with_water {
            let base = attributes.len() as u32;
            for p in [Vec3::new(0.0, 0.0, 1.0), Vec3::new(8.0, 0.0, 1.0), Vec3::new(0.0, 8.0, 1.0)] {
                attributes.positions.push(p);
                attributes.normals.push(Vec3::Z);
                attributes.uvs.push(Vec2::ZERO);
            }
            triangles.push(Triangle::new([base, base + 1, base + 2], 1));
            let mut water = Material::new("water", 1, vec!["water1".into(), "water2".into()]);
            water.kind = MaterialKind::AlphaBlended;
            water.frame_delay_ms = 100;
            materials.push(water);
        }

        Scene {
            attributes,
            triangles,
            materials,
            source_groups: Vec::new(),
        }
    }

    fn options(max_triangles: usize) -> ExportOptions {
        let mut options = ExportOptions::new("testzone");
        options.limits.max_triangles = max_triangles;
        options
    }

    fn chunk_tags(bytes: &[u8]) -> Vec<String> {
        ChunkReader::new(bytes)
            .map(|chunk| chunk.unwrap().0.to_string())
            .collect()
    }

    #[test]
    fn test_paths() {
        let options = ExportOptions::new("qeynos");
        assert_eq!(
            options.texture_path("grass01.png"),
            "WORLD\\ZONES\\QEYNOS\\TEXTURES\\GRASS01.BLP"
        );
        assert_eq!(
            options.model_path("qeynos_doodad_000"),
            "WORLD\\ZONES\\QEYNOS\\DOODADS\\QEYNOS_DOODAD_000\\QEYNOS_DOODAD_000.MDX"
        );
        assert_eq!(options.group_file_name(7), "qeynos_007.wmo");
    }

    #[test]
    fn test_files_for_split_zone() {
        let scene = zone(8, false);
        let converted = convert_scene(&scene, &options(40), &ExportIds::default()).unwrap();

        // 128 triangles at 40 per group
        assert!(converted.group_count() >= 4);
        assert_eq!(converted.files.len(), 1 + converted.group_count());
        assert_eq!(converted.files[0].path, PathBuf::from("testzone.wmo"));
        assert_eq!(converted.files[1].path, PathBuf::from("testzone_000.wmo"));
        assert_eq!(converted.wmo_id, DEFAULT_WMO_ID);
        assert_eq!(converted.group_ids.start, DEFAULT_FIRST_GROUP_ID);

        let root_tags = chunk_tags(&converted.files[0].bytes);
        assert_eq!(&root_tags[..5], ["MVER", "MOHD", "MOTX", "MOMT", "MOGN"]);
        assert_eq!(root_tags.last().map(String::as_str), Some("MFOG"));

        let group = &converted.files[1].bytes;
        let (_, _, rest) = unwrap(group).unwrap();
        let (tag, payload, _) = unwrap(rest).unwrap();
        assert_eq!(tag, ChunkTag::new("MOGP").unwrap());
        let group_id = u32::from_le_bytes(payload[56..60].try_into().unwrap());
        assert_eq!(group_id, DEFAULT_FIRST_GROUP_ID);
        let sub_tags = chunk_tags(&payload[WmoGroup::HEADER_SIZE..]);
        assert_eq!(
            sub_tags,
            ["MOPY", "MOVI", "MOVT", "MONR", "MOTV", "MOBA", "MOBN", "MOBR"]
        );
    }

    #[test]
    fn test_ids_stable_between_runs() {
        let scene = zone(6, false);
        let first = convert_scene(&scene, &options(20), &ExportIds::default()).unwrap();
        let second = convert_scene(&scene, &options(20), &ExportIds::default()).unwrap();
        assert_eq!(first.group_ids, second.group_ids);
        assert_eq!(first.files, second.files);
    }

    #[test]
    fn test_shared_allocator_continues_across_zones() {
        let ids = ExportIds::default();
        let a = convert_scene(&zone(4, false), &options(10), &ids).unwrap();
        let b = convert_scene(&zone(4, false), &options(10), &ids).unwrap();
        assert_eq!(b.wmo_id, a.wmo_id + 1);
        assert_eq!(b.group_ids.start, a.group_ids.end);
    }

    #[test]
    fn test_animated_material_becomes_doodad() {
        let scene = zone(2, true);
        let converted = convert_scene(&scene, &options(100), &ExportIds::default()).unwrap();

        assert_eq!(converted.doodad_count, 1);
        let paths: Vec<&PathBuf> = converted.files.iter().map(|f| &f.path).collect();
        assert!(paths.contains(&&PathBuf::from("doodads/testzone_doodad_000/testzone_doodad_000.m2")));
        assert!(paths.contains(&&PathBuf::from("doodads/testzone_doodad_000/testzone_doodad_00000.skin")));

        let m2 = converted
            .files
            .iter()
            .find(|f| f.path.extension().is_some_and(|e| e == "m2"))
            .unwrap();
        assert_eq!(&m2.bytes[0..4], b"MD20");
        // two animation frames become two textures
        assert_eq!(u32::from_le_bytes(m2.bytes[0x50..0x54].try_into().unwrap()), 2);

        // the group overlapping the doodad references it
        let group = &converted.files[1].bytes;
        let (_, _, rest) = unwrap(group).unwrap();
        let (_, payload, _) = unwrap(rest).unwrap();
        let flags = u32::from_le_bytes(payload[8..12].try_into().unwrap());
        assert_ne!(flags & group_flags::HAS_DOODADS, 0);
        assert!(chunk_tags(&payload[WmoGroup::HEADER_SIZE..]).contains(&"MODR".to_string()));
    }

    #[test]
    fn test_invisible_material_is_collision_only() {
        let mut scene = zone(2, false);
        scene.materials[0].kind = MaterialKind::Invisible;
        let converted = convert_scene(&scene, &options(100), &ExportIds::default()).unwrap();

        assert_eq!(
            converted.diagnostics,
            vec![Diagnostic::NotRendered {
                partition: 0,
                material: 0,
                triangles: 8
            }]
        );
        let group = &converted.files[1].bytes;
        let (_, _, rest) = unwrap(group).unwrap();
        let (_, payload, _) = unwrap(rest).unwrap();
        let mut chunks = ChunkReader::new(&payload[WmoGroup::HEADER_SIZE..]);
        let (tag, mopy) = chunks.next().unwrap().unwrap();
        assert_eq!(tag.to_string(), "MOPY");
        assert!(mopy.chunks(2).all(|entry| entry[1] == NON_RENDERABLE_MATERIAL));
    }

    /// Floor plus one partition above the 16-bit vertex range
    fn oversized_zone() -> (Scene, ExportOptions) {
        let mut scene = zone(2, false);
        let base = scene.attributes.len() as u32;
        let extra: u32 = 66000;
        for i in 0..extra {
            scene.attributes.positions.push(Vec3::new(i as f32, 100.0, 0.0));
            scene.attributes.normals.push(Vec3::Z);
            scene.attributes.uvs.push(Vec2::ZERO);
        }
        for k in 0..extra / 3 {
            let a = base + k * 3;
            scene.triangles.push(Triangle::new([a, a + 1, a + 2], 0));
        }
        let mut options = options(100_000);
        options.limits.max_vertices = 70000;
        (scene, options)
    }

    fn m2_texture_count(converted: &ConvertedZone, name: &str) -> u32 {
        let path = PathBuf::from(format!("doodads/{name}/{name}.m2"));
        let m2 = converted.files.iter().find(|f| f.path == path).unwrap();
        u32::from_le_bytes(m2.bytes[0x50..0x54].try_into().unwrap())
    }

    #[test]
    fn test_each_animated_material_gets_its_own_doodad() {
        let mut scene = zone(2, true);
        let base = scene.attributes.len() as u32;
        for p in [Vec3::new(8.0, 8.0, 1.0), Vec3::new(16.0, 8.0, 1.0), Vec3::new(8.0, 16.0, 1.0)] {
            scene.attributes.positions.push(p);
            scene.attributes.normals.push(Vec3::Z);
            scene.attributes.uvs.push(Vec2::ZERO);
        }
        scene.triangles.push(Triangle::new([base, base + 1, base + 2], 2));
        let frames = vec!["lava1".into(), "lava2".into(), "lava3".into()];
        let mut lava = Material::new("lava", 2, frames);
        lava.frame_delay_ms = 100;
        scene.materials.push(lava);

        let converted = convert_scene(&scene, &options(100), &ExportIds::default()).unwrap();
        assert_eq!(converted.doodad_count, 2);
        assert_eq!(m2_texture_count(&converted, "testzone_doodad_000"), 2);
        assert_eq!(m2_texture_count(&converted, "testzone_doodad_001"), 3);
    }

    #[test]
    fn test_export_options_keep_16_bit_vertex_limit() {
        let options = ExportOptions::new("qeynos");
        assert_eq!(options.limits.max_triangles, DEFAULT_MAX_TRIANGLES);
        assert_eq!(options.limits.max_vertices, u16::MAX as usize);
    }

    #[test]
    fn test_vertex_overflow_aborts_without_writing() {
        let (scene, options) = oversized_zone();
        let mut sink = MemorySink::new();
        let result = export_scene(&scene, &options, &ExportIds::default(), &mut sink);
        let error = result.unwrap_err();
        assert!(error.chain().any(|e| e.downcast_ref::<FormatError>().is_some()));
        assert!(sink.files.is_empty());
    }

    #[test]
    fn test_failed_zone_leaves_ids_unused() {
        let ids = ExportIds::default();
        let (oversized, oversized_options) = oversized_zone();
        assert!(convert_scene(&oversized, &oversized_options, &ids).is_err());

        let next = convert_scene(&zone(4, false), &options(10), &ids).unwrap();
        assert_eq!(next.wmo_id, DEFAULT_WMO_ID);
        assert_eq!(next.group_ids.start, DEFAULT_FIRST_GROUP_ID);
    }

    #[test]
    fn test_invalid_limit_rejected_before_work() {
        let scene = zone(2, false);
        let result = convert_scene(&scene, &options(0), &ExportIds::default());
        assert!(result.is_err());
    }
}
