//! Size-bounded mesh partitioning
//!
//! The target client draws at most [`DEFAULT_MAX_TRIANGLES`] faces per group,
//! so a zone is split into self-contained partitions before serialization.
//! Every partition owns a compacted vertex space starting at 0.
//!
//! Only the triangle count is bounded by default. Writers with 16-bit indices
//! also set [`PartitionLimits::max_vertices`] to [`DEFAULT_MAX_VERTICES`].
//!
//! Finalizing a set of input triangles is the same for every strategy:
//! stable sort by material, one [`remap`] call, one bounding box, then render
//! batches for each material run.

mod batches;
mod by_group;
mod by_material;
mod by_region;

use hashbrown::HashSet;
use serde::Deserialize;
use std::fmt;

use wow_common::{BoundingBox, Triangle, VertexAttributes};

use crate::remap::remap;
use crate::scene::Scene;

pub use batches::RenderBatch;

/// Per-group face limit of the target client
pub const DEFAULT_MAX_TRIANGLES: usize = 2100;
/// Largest vertex count addressable by 16-bit indices
pub const DEFAULT_MAX_VERTICES: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionLimits {
    pub max_triangles: usize,
    /// `usize::MAX` leaves vertex counts unbounded
    pub max_vertices: usize,
}

impl PartitionLimits {
    /// Bound the triangle count only
    pub fn triangles(max_triangles: usize) -> Self {
        Self {
            max_triangles,
            max_vertices: usize::MAX,
        }
    }

    /// Triangle bound plus the 16-bit vertex range of WMO and M2 files
    pub fn u16_indexed(max_triangles: usize) -> Self {
        Self {
            max_triangles,
            max_vertices: DEFAULT_MAX_VERTICES,
        }
    }
}

impl Default for PartitionLimits {
    fn default() -> Self {
        Self::triangles(DEFAULT_MAX_TRIANGLES)
    }
}

/// How an oversized triangle set is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionStrategy {
    /// One run of partitions per material, in ascending material order
    ByMaterial,
    /// Recursive halving of the horizontal extent
    #[default]
    ByRegion,
    /// Keep source groups whole, packing several into one partition
    BySourceGroup,
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartitionStrategy::ByMaterial => "by-material",
            PartitionStrategy::ByRegion => "by-region",
            PartitionStrategy::BySourceGroup => "by-source-group",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("{name} must be at least {min}, got {value}")]
    InvalidLimit {
        name: &'static str,
        value: usize,
        min: usize,
    },
}

/// Non-fatal problems found while partitioning or converting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Material index is negative or not in the scene's material list
    InvalidMaterial { triangle: usize, material: i32 },
    /// Material has no texture and cannot be drawn
    MissingTexture { triangle: usize, material: u32 },
    /// A source group alone exceeds the limits and was split
    OversizedGroup {
        group: u32,
        triangles: usize,
        vertices: usize,
    },
    /// Triangles kept for collision only
    NotRendered {
        partition: usize,
        material: u32,
        triangles: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::InvalidMaterial { triangle, material } => {
                write!(f, "triangle {triangle} has invalid material {material}, dropped")
            }
            Diagnostic::MissingTexture { triangle, material } => {
                write!(f, "triangle {triangle} uses untextured material {material}, dropped")
            }
            Diagnostic::OversizedGroup {
                group,
                triangles,
                vertices,
            } => write!(
                f,
                "source group {group} ({triangles} triangles, {vertices} vertices) exceeds the limits and was split"
            ),
            Diagnostic::NotRendered {
                partition,
                material,
                triangles,
            } => write!(
                f,
                "partition {partition}: {triangles} triangles of material {material} are collision only"
            ),
        }
    }
}

/// A self-contained piece of the input mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPartition {
    pub attributes: VertexAttributes,
    /// Sorted by material, indices into `attributes`
    pub triangles: Vec<Triangle>,
    pub bounds: BoundingBox,
    pub radius: f32,
    pub batches: Vec<RenderBatch>,
    /// Input triangle index of each output triangle
    pub source_triangles: Vec<usize>,
    /// Input vertex index of each output vertex
    pub source_vertices: Vec<u32>,
}

impl MeshPartition {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.attributes.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PartitionOutput {
    pub partitions: Vec<MeshPartition>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct Partitioner {
    limits: PartitionLimits,
}

impl Partitioner {
    pub fn new(limits: PartitionLimits) -> Result<Self, PartitionError> {
        if limits.max_triangles < 1 {
            return Err(PartitionError::InvalidLimit {
                name: "max_triangles",
                value: limits.max_triangles,
                min: 1,
            });
        }
        if limits.max_vertices < 3 {
            return Err(PartitionError::InvalidLimit {
                name: "max_vertices",
                value: limits.max_vertices,
                min: 3,
            });
        }
        Ok(Self { limits })
    }

    pub fn limits(&self) -> PartitionLimits {
        self.limits
    }

    /// Partition every triangle of `scene`
    pub fn partition(&self, scene: &Scene, strategy: PartitionStrategy) -> PartitionOutput {
        let all: Vec<usize> = (0..scene.triangles.len()).collect();
        self.partition_subset(scene, &all, strategy)
    }

    /// Partition the triangles of `scene` listed in `selection`
    pub fn partition_subset(
        &self,
        scene: &Scene,
        selection: &[usize],
        strategy: PartitionStrategy,
    ) -> PartitionOutput {
        let materials = scene.material_map();
        let mut diagnostics = Vec::new();
        let mut kept = Vec::with_capacity(selection.len());

        for &triangle in selection {
            let material = scene.triangles[triangle].material;
            let found = u32::try_from(material)
                .ok()
                .and_then(|index| materials.get(&index));
            match found {
                None => diagnostics.push(Diagnostic::InvalidMaterial { triangle, material }),
                Some(m) if strategy == PartitionStrategy::BySourceGroup && !m.has_texture() => {
                    diagnostics.push(Diagnostic::MissingTexture {
                        triangle,
                        material: m.index,
                    })
                }
                Some(_) => kept.push(triangle),
            }
        }

        let sets = if kept.is_empty() {
            Vec::new()
        } else if self.fits(scene, &kept) {
            vec![kept]
        } else {
            match strategy {
                PartitionStrategy::ByMaterial => by_material::split(self, scene, &kept),
                PartitionStrategy::ByRegion => by_region::split(self, scene, kept),
                PartitionStrategy::BySourceGroup => {
                    by_group::split(self, scene, &kept, &mut diagnostics)
                }
            }
        };

        let partitions: Vec<MeshPartition> =
            sets.iter().map(|set| build_partition(scene, set)).collect();
        tracing::debug!(
            "Partitioned {} triangles into {} partitions ({})",
            selection.len(),
            partitions.len(),
            strategy
        );

        PartitionOutput {
            partitions,
            diagnostics,
        }
    }

    /// Whether `set` can become a single partition
    pub(crate) fn fits(&self, scene: &Scene, set: &[usize]) -> bool {
        set.len() <= self.limits.max_triangles
            && vertex_count(scene, set) <= self.limits.max_vertices
    }

    /// Split `set` in order, starting a new chunk whenever the next triangle
    /// would break either limit
    pub(crate) fn sequential_chunks(&self, scene: &Scene, set: &[usize]) -> Vec<Vec<usize>> {
        let mut chunks = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut seen: HashSet<u32> = HashSet::new();

        for &triangle in set {
            let indices = scene.triangles[triangle].indices;
            let added = indices.iter().filter(|i| !seen.contains(*i)).count();
            if !current.is_empty()
                && (current.len() == self.limits.max_triangles
                    || seen.len() + added > self.limits.max_vertices)
            {
                chunks.push(std::mem::take(&mut current));
                seen.clear();
            }
            seen.extend(indices);
            current.push(triangle);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Distinct vertices referenced by `set`
pub(crate) fn vertex_count(scene: &Scene, set: &[usize]) -> usize {
    let mut seen: HashSet<u32> = HashSet::with_capacity(set.len());
    for &triangle in set {
        seen.extend(scene.triangles[triangle].indices);
    }
    seen.len()
}

/// Material-sorted, remapped partition for `set`.
///
/// The stable sort keeps one render batch per material. When the input
/// interleaves materials, even the short-circuit partition is therefore a
/// remap of the sorted triangles rather than the identity.
fn build_partition(scene: &Scene, set: &[usize]) -> MeshPartition {
    let mut order = set.to_vec();
    order.sort_by_key(|&t| scene.triangles[t].material);
    let triangles: Vec<Triangle> = order.iter().map(|&t| scene.triangles[t]).collect();

    let remapped = remap(&triangles, &scene.attributes);
    let bounds = BoundingBox::from_points(&remapped.attributes.positions);
    let batches = batches::render_batches(&remapped.triangles, &remapped.attributes.positions);

    MeshPartition {
        radius: bounds.sphere_radius(),
        bounds,
        batches,
        attributes: remapped.attributes,
        triangles: remapped.triangles,
        source_triangles: order,
        source_vertices: remapped.new_to_old,
    }
}
