//! Recursive spatial halving
//!
//! The centroid box of the current set is cut at the midpoint of its longer
//! horizontal axis. Centroids strictly below the plane go to the lower half,
//! everything else (including centroids on the plane) to the upper half.
//! Sets that cannot be separated are chunked in input order.

use glam::Vec3;

use wow_common::BoundingBox;

use super::Partitioner;
use crate::scene::Scene;

/// Recursion floor for degenerate inputs
const MAX_DEPTH: u32 = 64;

pub(super) fn split(partitioner: &Partitioner, scene: &Scene, triangles: Vec<usize>) -> Vec<Vec<usize>> {
    let mut centroids = vec![Vec3::ZERO; scene.triangles.len()];
    for &triangle in &triangles {
        centroids[triangle] = scene.triangles[triangle].centroid(&scene.attributes.positions);
    }

    let mut splitter = RegionSplitter {
        partitioner,
        scene,
        centroids,
        sets: Vec::new(),
    };
    splitter.split(triangles, 0);
    splitter.sets
}

struct RegionSplitter<'a> {
    partitioner: &'a Partitioner,
    scene: &'a Scene,
    centroids: Vec<Vec3>,
    sets: Vec<Vec<usize>>,
}

impl RegionSplitter<'_> {
    fn split(&mut self, set: Vec<usize>, depth: u32) {
        if self.partitioner.fits(self.scene, &set) {
            self.sets.push(set);
            return;
        }
        if depth >= MAX_DEPTH {
            tracing::debug!("Region split reached depth {}, chunking {} triangles", depth, set.len());
            self.chunk(&set);
            return;
        }

        let bounds = BoundingBox::from_points_iter(set.iter().map(|&t| self.centroids[t]));
        let axis = bounds.longer_horizontal_axis();
        let (_, _, plane) = bounds.split(axis);
        let (lower, upper): (Vec<usize>, Vec<usize>) = set
            .iter()
            .copied()
            .partition(|&t| BoundingBox::is_below(self.centroids[t], axis, plane));

        if lower.is_empty() || upper.is_empty() {
            self.chunk(&set);
            return;
        }
        self.split(lower, depth + 1);
        self.split(upper, depth + 1);
    }

    fn chunk(&mut self, set: &[usize]) {
        let chunks = self.partitioner.sequential_chunks(self.scene, set);
        self.sets.extend(chunks);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_covers, limits, quad_grid};
    use super::super::*;
    use glam::{Vec2, Vec3};
    use wow_common::{Material, Triangle};

    #[test]
    fn test_halves_along_longer_axis() {
        // 8 x 2 quads, longer along X
        let scene = quad_grid(8, 2, |_, _| 0);
        let partitioner = Partitioner::new(limits(16)).unwrap();
        let output = partitioner.partition(&scene, PartitionStrategy::ByRegion);

        assert_eq!(output.partitions.len(), 2);
        let left = &output.partitions[0];
        let right = &output.partitions[1];
        assert!(left.bounds.max.x <= 4.0);
        assert!(right.bounds.min.x >= 4.0);
        assert_eq!(left.triangle_count(), 16);
        assert_eq!(right.triangle_count(), 16);
        assert_covers(&scene, &output, 32);
    }

    #[test]
    fn test_every_partition_within_limit() {
        let scene = quad_grid(13, 7, |x, y| ((x + y) % 2) as i32);
        let partitioner = Partitioner::new(limits(10)).unwrap();
        let output = partitioner.partition(&scene, PartitionStrategy::ByRegion);

        assert!(output.partitions.len() >= 19);
        for partition in &output.partitions {
            assert!(partition.triangle_count() <= 10);
            let vertices = partition.vertex_count() as u32;
            assert!(partition.triangles.iter().all(|t| t.max_index() < vertices));
        }
        assert_covers(&scene, &output, 13 * 7 * 2);
    }

    #[test]
    fn test_stacked_triangles_fall_back_to_chunks() {
        // identical footprints stacked along Z: no horizontal split separates them
        let mut scene = Scene {
            materials: vec![Material::new("stone", 0, vec!["stone".into()])],
            ..Default::default()
        };
        for level in 0..9 {
            let z = level as f32;
            let base = scene.attributes.len() as u32;
            for p in [Vec3::new(0.0, 0.0, z), Vec3::new(1.0, 0.0, z), Vec3::new(0.0, 1.0, z)] {
                scene.attributes.positions.push(p);
                scene.attributes.normals.push(Vec3::Z);
                scene.attributes.uvs.push(Vec2::ZERO);
            }
            scene.triangles.push(Triangle::new([base, base + 1, base + 2], 0));
        }

        let partitioner = Partitioner::new(limits(4)).unwrap();
        let output = partitioner.partition(&scene, PartitionStrategy::ByRegion);
        let sizes: Vec<usize> = output
            .partitions
            .iter()
            .map(MeshPartition::triangle_count)
            .collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        assert_covers(&scene, &output, 9);
    }

    #[test]
    fn test_centroid_on_plane_goes_to_upper_half() {
        // centroids at x = 0, 1, 2; the plane sits exactly on the middle one
        let mut scene = Scene {
            materials: vec![Material::new("stone", 0, vec!["stone".into()])],
            ..Default::default()
        };
        for x in [0.0f32, 1.0, 2.0] {
            let base = scene.attributes.len() as u32;
            for p in [
                Vec3::new(x - 1.0, 0.0, 0.0),
                Vec3::new(x + 1.0, 0.0, 0.0),
                Vec3::new(x, 1.0, 0.0),
            ] {
                scene.attributes.positions.push(p);
                scene.attributes.normals.push(Vec3::Z);
                scene.attributes.uvs.push(Vec2::ZERO);
            }
            scene.triangles.push(Triangle::new([base, base + 1, base + 2], 0));
        }

        let partitioner = Partitioner::new(limits(2)).unwrap();
        let output = partitioner.partition(&scene, PartitionStrategy::ByRegion);
        assert_eq!(output.partitions.len(), 2);
        assert_eq!(output.partitions[0].source_triangles, vec![0]);
        assert_eq!(output.partitions[1].source_triangles, vec![1, 2]);
    }
}
