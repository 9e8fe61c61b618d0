use std::collections::BTreeMap;

use super::Partitioner;
use crate::scene::Scene;

/// Group by material index, ascending, then chunk each group in input order
pub(super) fn split(partitioner: &Partitioner, scene: &Scene, triangles: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for &triangle in triangles {
        groups
            .entry(scene.triangles[triangle].material)
            .or_default()
            .push(triangle);
    }

    groups
        .into_values()
        .flat_map(|group| partitioner.sequential_chunks(scene, &group))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_covers, limits, quad_grid};
    use super::super::*;

    #[test]
    fn test_groups_in_ascending_material_order() {
        // left half grass (1), right half stone (0)
        let scene = quad_grid(4, 2, |x, _| if x < 2 { 1 } else { 0 });
        let partitioner = Partitioner::new(limits(8)).unwrap();
        let output = partitioner.partition(&scene, PartitionStrategy::ByMaterial);

        assert_eq!(output.partitions.len(), 2);
        assert!(output.partitions[0].triangles.iter().all(|t| t.material == 0));
        assert!(output.partitions[1].triangles.iter().all(|t| t.material == 1));
        assert_covers(&scene, &output, 16);
    }

    #[test]
    fn test_oversized_material_chunked_to_exact_maximum() {
        let scene = quad_grid(5, 1, |_, _| 0);
        let partitioner = Partitioner::new(limits(4)).unwrap();
        let output = partitioner.partition(&scene, PartitionStrategy::ByMaterial);

        let sizes: Vec<usize> = output
            .partitions
            .iter()
            .map(MeshPartition::triangle_count)
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        // chunks keep input order
        assert_eq!(output.partitions[1].source_triangles, vec![4, 5, 6, 7]);
        assert_covers(&scene, &output, 10);
    }
}
