//! Vertex compaction for triangle subsets
//!
//! A partition only keeps the vertices its triangles reference. [`remap`]
//! walks the triangles once, copies each vertex the first time it is seen and
//! rewrites the indices into the new, dense vertex space.

use hashbrown::HashMap;
use wow_common::{Triangle, VertexAttributes};

/// A triangle subset re-indexed into its own vertex space
#[derive(Debug, Clone, PartialEq)]
pub struct Remapped {
    pub attributes: VertexAttributes,
    /// Input triangles in the same order, indices rewritten
    pub triangles: Vec<Triangle>,
    /// Input vertex index -> output vertex index
    pub old_to_new: HashMap<u32, u32>,
    /// Output vertex index -> input vertex index
    pub new_to_old: Vec<u32>,
}

/// Re-index `triangles` into a compacted copy of the vertices they use.
///
/// Vertices are numbered in first-encounter order and winding is preserved.
///
/// # Panics
///
/// Panics if any triangle references a vertex outside `source`. Every index is
/// checked before remapping starts.
pub fn remap(triangles: &[Triangle], source: &VertexAttributes) -> Remapped {
    let vertex_count = source.len();
    for (i, triangle) in triangles.iter().enumerate() {
        let max = triangle.max_index() as usize;
        assert!(
            max < vertex_count,
            "triangle {i} references vertex {max} but the source has {vertex_count} vertices"
        );
    }

    let capacity = (triangles.len() * 3).min(vertex_count);
    let mut attributes = VertexAttributes::with_capacity(capacity, source.colors.is_some());
    let mut old_to_new: HashMap<u32, u32> = HashMap::with_capacity(capacity);
    let mut new_to_old = Vec::with_capacity(capacity);

    let triangles: Vec<Triangle> = triangles
        .iter()
        .map(|triangle| {
            let indices = triangle.indices.map(|old| {
                *old_to_new.entry(old).or_insert_with(|| {
                    attributes.push_from(source, old as usize);
                    new_to_old.push(old);
                    (new_to_old.len() - 1) as u32
                })
            });
            Triangle::new(indices, triangle.material)
        })
        .collect();

    Remapped {
        attributes,
        triangles,
        old_to_new,
        new_to_old,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn grid(count: usize) -> VertexAttributes {
        VertexAttributes {
            positions: (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect(),
            normals: vec![Vec3::Z; count],
            uvs: (0..count).map(|i| Vec2::new(i as f32 * 0.1, 0.0)).collect(),
            colors: None,
        }
    }

    #[test]
    fn test_vertices_numbered_in_first_encounter_order() {
        let source = grid(10);
        let triangles = [Triangle::new([7, 3, 9], 0), Triangle::new([3, 9, 1], 0)];
        let remapped = remap(&triangles, &source);

        assert_eq!(remapped.new_to_old, vec![7, 3, 9, 1]);
        assert_eq!(remapped.triangles[0].indices, [0, 1, 2]);
        assert_eq!(remapped.triangles[1].indices, [1, 2, 3]);
        assert_eq!(remapped.old_to_new[&9], 2);
        assert_eq!(remapped.attributes.positions[3], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(remapped.attributes.uvs[0], source.uvs[7]);
    }

    #[test]
    fn test_shared_vertex_copied_once_and_material_kept() {
        let source = grid(4);
        let triangles = [Triangle::new([0, 1, 2], 3), Triangle::new([2, 1, 3], 5)];
        let remapped = remap(&triangles, &source);
        assert_eq!(remapped.attributes.len(), 4);
        assert_eq!(remapped.triangles[0].material, 3);
        assert_eq!(remapped.triangles[1].material, 5);
    }

    #[test]
    fn test_colors_follow_their_vertices() {
        let mut source = grid(3);
        source.colors = Some(vec![[1, 0, 0, 255], [0, 1, 0, 255], [0, 0, 1, 255]]);
        let remapped = remap(&[Triangle::new([2, 0, 1], 0)], &source);
        assert_eq!(
            remapped.attributes.colors,
            Some(vec![[0, 0, 1, 255], [1, 0, 0, 255], [0, 1, 0, 255]])
        );
        assert!(remapped.attributes.validate().is_ok());
    }

    #[test]
    fn test_empty_input() {
        let remapped = remap(&[], &grid(3));
        assert!(remapped.attributes.is_empty());
        assert!(remapped.triangles.is_empty());
    }

    #[test]
    #[should_panic(expected = "triangle 1 references vertex 5")]
    fn test_out_of_range_index_panics() {
        let source = grid(5);
        remap(
            &[Triangle::new([0, 1, 2], 0), Triangle::new([1, 2, 5], 0)],
            &source,
        );
    }
}
