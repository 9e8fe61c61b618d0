//! In-memory scene geometry
//!
//! Vertex attributes are stored as parallel arrays indexed by a single vertex
//! index. Triangles reference vertices by index and materials by
//! [`Material::index`].

use glam::{Vec2, Vec3};

/// Error returned when attribute arrays disagree in length
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("{attribute} has {actual} entries, expected {expected}")]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Parallel per-vertex attribute arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexAttributes {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// RGBA, absent for the whole set or present for every vertex
    pub colors: Option<Vec<[u8; 4]>>,
}

impl VertexAttributes {
    /// Empty set with room for `capacity` vertices
    pub fn with_capacity(capacity: usize, with_colors: bool) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            normals: Vec::with_capacity(capacity),
            uvs: Vec::with_capacity(capacity),
            colors: with_colors.then(|| Vec::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append vertex `index` of `source`
    pub fn push_from(&mut self, source: &VertexAttributes, index: usize) {
        self.positions.push(source.positions[index]);
        self.normals.push(source.normals[index]);
        self.uvs.push(source.uvs[index]);
        if let (Some(dst), Some(src)) = (self.colors.as_mut(), source.colors.as_ref()) {
            dst.push(src[index]);
        }
    }

    /// Check that every present attribute matches the position count
    pub fn validate(&self) -> Result<(), MeshError> {
        let expected = self.positions.len();
        let check = |attribute, actual| {
            if actual == expected {
                Ok(())
            } else {
                Err(MeshError::AttributeLength {
                    attribute,
                    expected,
                    actual,
                })
            }
        };
        check("normals", self.normals.len())?;
        check("uvs", self.uvs.len())?;
        if let Some(colors) = &self.colors {
            check("colors", colors.len())?;
        }
        Ok(())
    }
}

/// Three vertex indices plus a material tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub indices: [u32; 3],
    /// Material index; negative means unassigned
    pub material: i32,
}

impl Triangle {
    pub fn new(indices: [u32; 3], material: i32) -> Self {
        Self { indices, material }
    }

    /// Two or more indices are equal
    pub fn is_degenerate(&self) -> bool {
        let [a, b, c] = self.indices;
        a == b || b == c || a == c
    }

    pub fn centroid(&self, positions: &[Vec3]) -> Vec3 {
        let [a, b, c] = self.indices;
        (positions[a as usize] + positions[b as usize] + positions[c as usize]) / 3.0
    }

    pub fn max_index(&self) -> u32 {
        self.indices.into_iter().max().unwrap_or(0)
    }
}

/// How a material is blended or whether it renders at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialKind {
    #[default]
    Opaque,
    AlphaBlended,
    Additive,
    Invisible,
    Boundary,
}

impl MaterialKind {
    /// Blend mode value stored in material records
    pub fn blend_mode(self) -> u32 {
        match self {
            MaterialKind::Opaque | MaterialKind::Invisible | MaterialKind::Boundary => 0,
            MaterialKind::AlphaBlended => 2,
            MaterialKind::Additive => 3,
        }
    }

    pub fn is_visible(self) -> bool {
        !matches!(self, MaterialKind::Invisible | MaterialKind::Boundary)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Join key used by [`Triangle::material`]
    pub index: u32,
    /// More than one texture means a frame-animated material
    pub textures: Vec<String>,
    pub frame_delay_ms: u32,
    pub kind: MaterialKind,
}

impl Material {
    pub fn new(name: impl Into<String>, index: u32, textures: Vec<String>) -> Self {
        Self {
            name: name.into(),
            index,
            textures,
            frame_delay_ms: 0,
            kind: MaterialKind::Opaque,
        }
    }

    pub fn has_texture(&self) -> bool {
        !self.textures.is_empty()
    }

    pub fn is_animated(&self) -> bool {
        self.textures.len() > 1
    }

    /// Has a texture and a visible kind
    pub fn is_renderable(&self) -> bool {
        self.has_texture() && self.kind.is_visible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_partial_colors() {
        let mut attrs = VertexAttributes {
            positions: vec![Vec3::ZERO; 3],
            normals: vec![Vec3::Z; 3],
            uvs: vec![Vec2::ZERO; 3],
            colors: None,
        };
        assert!(attrs.validate().is_ok());

        attrs.colors = Some(vec![[255; 4]; 2]);
        assert_eq!(
            attrs.validate(),
            Err(MeshError::AttributeLength {
                attribute: "colors",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_degenerate_detection() {
        assert!(!Triangle::new([0, 1, 2], 0).is_degenerate());
        assert!(Triangle::new([0, 0, 2], 0).is_degenerate());
        assert!(Triangle::new([3, 1, 3], 0).is_degenerate());
    }

    #[test]
    fn test_renderable_requires_texture_and_visible_kind() {
        let mut m = Material::new("wall", 0, vec!["wall.blp".into()]);
        assert!(m.is_renderable());
        m.kind = MaterialKind::Boundary;
        assert!(!m.is_renderable());
        let empty = Material::new("empty", 1, Vec::new());
        assert!(!empty.is_renderable());
    }
}
