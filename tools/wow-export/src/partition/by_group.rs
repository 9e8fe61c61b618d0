use hashbrown::HashMap;

use super::{Diagnostic, Partitioner, vertex_count};
use crate::scene::Scene;

/// Pack whole source groups, in first-appearance order, into partitions.
///
/// A group is never split unless it breaks the limits on its own.
pub(super) fn split(
    partitioner: &Partitioner,
    scene: &Scene,
    triangles: &[usize],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Vec<usize>> {
    let limits = partitioner.limits();

    let mut order: Vec<u32> = Vec::new();
    let mut members: HashMap<u32, Vec<usize>> = HashMap::new();
    for &triangle in triangles {
        let group = scene.source_group(triangle);
        members
            .entry(group)
            .or_insert_with(|| {
                order.push(group);
                Vec::new()
            })
            .push(triangle);
    }

    let mut sets = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_vertices = 0;

    for group in order {
        let Some(group_triangles) = members.remove(&group) else {
            continue;
        };
        let vertices = vertex_count(scene, &group_triangles);

        if group_triangles.len() > limits.max_triangles || vertices > limits.max_vertices {
            diagnostics.push(Diagnostic::OversizedGroup {
                group,
                triangles: group_triangles.len(),
                vertices,
            });
            if !current.is_empty() {
                sets.push(std::mem::take(&mut current));
                current_vertices = 0;
            }
            sets.extend(partitioner.sequential_chunks(scene, &group_triangles));
            continue;
        }

        if !current.is_empty()
            && (current.len() + group_triangles.len() > limits.max_triangles
                || current_vertices + vertices > limits.max_vertices)
        {
            sets.push(std::mem::take(&mut current));
            current_vertices = 0;
        }
        current.extend(group_triangles);
        current_vertices += vertices;
    }

    if !current.is_empty() {
        sets.push(current);
    }
    sets
}
