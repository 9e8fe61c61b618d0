use glam::Vec3;

use wow_common::{BoundingBox, Triangle};

/// A contiguous single-material run of a partition's triangles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderBatch {
    pub material: u32,
    /// Position in the index buffer (3 x first triangle)
    pub first_index: u32,
    pub index_count: u32,
    pub min_vertex: u32,
    pub max_vertex: u32,
    pub bounds: BoundingBox,
}

impl RenderBatch {
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    /// Triangle range covered by this batch
    pub fn triangles(&self) -> std::ops::Range<usize> {
        let first = (self.first_index / 3) as usize;
        first..first + self.triangle_count() as usize
    }
}

/// One batch per material run. `triangles` must already be sorted by material.
pub(super) fn render_batches(triangles: &[Triangle], positions: &[Vec3]) -> Vec<RenderBatch> {
    let mut batches = Vec::new();
    let mut first_triangle = 0;

    for run in triangles.chunk_by(|a, b| a.material == b.material) {
        let indices = || run.iter().flat_map(|t| t.indices);
        let min_vertex = indices().min().unwrap_or(0);
        let max_vertex = indices().max().unwrap_or(0);
        let bounds = BoundingBox::from_points_iter(indices().map(|i| positions[i as usize]));

        batches.push(RenderBatch {
            material: run[0].material as u32,
            first_index: (first_triangle * 3) as u32,
            index_count: (run.len() * 3) as u32,
            min_vertex,
            max_vertex,
            bounds,
        });
        first_triangle += run.len();
    }
    batches
}
