//! Per-partition collision tree (MOBN / MOBR)
//!
//! Non-degenerate triangles are split recursively on the longer horizontal
//! axis of their centroid box. Each triangle lands in exactly one leaf, and
//! leaves own contiguous runs of the shared face list.

use glam::Vec3;

use wow_common::formats::{BspNode, BspNodeKind, FormatError, to_u16};
use wow_common::{Axis, BoundingBox, Triangle};

/// Leaves hold at most this many triangles unless another floor stops the split
pub const MIN_SPLIT_SIZE: usize = 50;
/// Boxes whose summed extent is below this are not split
pub const MIN_BOX_SIZE_TOTAL: f32 = 1.0;
pub const MAX_DEPTH: u32 = 32;
/// Child index of an absent child
pub const NO_CHILD: i16 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionTree {
    pub nodes: Vec<BspNode>,
    /// Triangle indices referenced by leaves through `face_start`/`face_count`
    pub faces: Vec<u32>,
}

impl CollisionTree {
    /// A single leaf with no faces
    pub fn empty() -> Self {
        Self {
            nodes: vec![BspNode::leaf(0, 0)],
            faces: Vec::new(),
        }
    }

    pub fn build(positions: &[Vec3], triangles: &[Triangle]) -> Result<Self, FormatError> {
        let faces: Vec<u32> = triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_degenerate())
            .map(|(i, _)| i as u32)
            .collect();
        if faces.is_empty() {
            return Ok(Self::empty());
        }

        let centroids: Vec<Vec3> = triangles.iter().map(|t| t.centroid(positions)).collect();
        let mut builder = TreeBuilder {
            centroids,
            tree: Self {
                nodes: Vec::new(),
                faces: Vec::with_capacity(faces.len()),
            },
        };
        builder.node(faces, 0)?;
        Ok(builder.tree)
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &BspNode> {
        self.nodes.iter().filter(|n| n.kind == BspNodeKind::Leaf)
    }

    /// Face list narrowed to MOBR entries
    pub fn face_indices_u16(&self) -> Result<Vec<u16>, FormatError> {
        self.faces
            .iter()
            .map(|&f| to_u16("collision face", f as usize))
            .collect()
    }
}

struct TreeBuilder {
    centroids: Vec<Vec3>,
    tree: CollisionTree,
}

impl TreeBuilder {
    /// Build the subtree for `faces` and return its node index
    fn node(&mut self, faces: Vec<u32>, depth: u32) -> Result<i16, FormatError> {
        let index = self.tree.nodes.len();
        let node_index = i16::try_from(index).map_err(|_| FormatError::FieldOverflow {
            what: "collision node",
            value: index,
            max: i16::MAX as usize,
        })?;
        self.tree.nodes.push(BspNode::leaf(0, 0));

        match self.split(&faces, depth) {
            Some((axis, plane, lower, upper)) => {
                let neg_child = self.node(lower, depth + 1)?;
                let pos_child = self.node(upper, depth + 1)?;
                self.tree.nodes[index] = BspNode {
                    kind: match axis {
                        Axis::X => BspNodeKind::SplitX,
                        Axis::Y => BspNodeKind::SplitY,
                    },
                    neg_child,
                    pos_child,
                    face_count: 0,
                    face_start: 0,
                    plane_distance: plane,
                };
            }
            None => {
                let face_start = self.tree.faces.len() as u32;
                let face_count = to_u16("collision leaf faces", faces.len())?;
                self.tree.faces.extend(faces);
                self.tree.nodes[index] = BspNode::leaf(face_start, face_count);
            }
        }
        Ok(node_index)
    }

    /// Split plane and halves, or `None` when `faces` becomes a leaf
    fn split(&self, faces: &[u32], depth: u32) -> Option<(Axis, f32, Vec<u32>, Vec<u32>)> {
        if faces.len() <= MIN_SPLIT_SIZE || depth >= MAX_DEPTH {
            return None;
        }
        let bounds =
            BoundingBox::from_points_iter(faces.iter().map(|&f| self.centroids[f as usize]));
        let extent = bounds.extent();
        if extent.x + extent.y + extent.z < MIN_BOX_SIZE_TOTAL {
            return None;
        }

        let axis = bounds.longer_horizontal_axis();
        let (_, _, plane) = bounds.split(axis);
        let (lower, upper): (Vec<u32>, Vec<u32>) = faces
            .iter()
            .copied()
            .partition(|&f| BoundingBox::is_below(self.centroids[f as usize], axis, plane));
        if lower.is_empty() || upper.is_empty() {
            return None;
        }
        Some((axis, plane, lower, upper))
    }
}
