//! Shared geometry and file formats for WoW zone export
//!
//! This crate provides the pieces shared by the exporter and its tests:
//!
//! # Modules
//!
//! - [`bounds`] - Axis-aligned boxes, sphere radius, 16-bit batch boxes
//! - [`mesh`] - Vertex attributes, triangles and materials
//! - [`formats`] - Chunk, offset-array, WMO, M2 and skin writers

pub mod bounds;
pub mod formats;
pub mod mesh;

pub use bounds::{Axis, BoundingBox, LowResBox};
pub use mesh::{Material, MaterialKind, MeshError, Triangle, VertexAttributes};

// Re-export commonly used format items
pub use formats::{
    ByteArena, ChunkError, ChunkReader, ChunkTag, ChunkWriter, FormatError, OffsetArray,
    OffsetRecord,
};
