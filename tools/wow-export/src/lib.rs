//! wow-export library
//!
//! Splits a scene into size-bounded partitions and writes them as WMO group,
//! WMO root and M2 doodad files. The CLI in `main.rs` is a thin layer over
//! [`convert::export_scene`].

pub mod collision;
pub mod convert;
pub mod ids;
pub mod inspect;
pub mod manifest;
pub mod obj;
pub mod partition;
pub mod remap;
pub mod scene;

pub use collision::CollisionTree;
pub use convert::{ConvertedZone, ExportIds, ExportOptions, OutputFile, convert_scene, export_scene};
pub use ids::IdAllocator;
pub use partition::{
    Diagnostic, MeshPartition, PartitionError, PartitionLimits, PartitionOutput, PartitionStrategy,
    Partitioner, RenderBatch,
};
pub use remap::{Remapped, remap};
pub use scene::{DirectorySink, MemorySink, OutputSink, Scene, SceneSource};
