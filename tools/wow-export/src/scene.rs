//! Scene model and the input/output seams of the pipeline

use anyhow::{Context, Result};
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use wow_common::{Material, Triangle, VertexAttributes};

/// Geometry handed to the partitioner
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub attributes: VertexAttributes,
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    /// Source group id per triangle (OBJ `g`/`o` blocks). Missing entries
    /// count as group 0.
    pub source_groups: Vec<u32>,
}

impl Scene {
    pub fn source_group(&self, triangle: usize) -> u32 {
        self.source_groups.get(triangle).copied().unwrap_or(0)
    }

    /// Material lookup keyed by [`Material::index`]
    pub fn material_map(&self) -> HashMap<u32, &Material> {
        self.materials.iter().map(|m| (m.index, m)).collect()
    }

    /// Position of a material in [`materials`](Self::materials), keyed by its index
    pub fn material_slots(&self) -> HashMap<u32, usize> {
        self.materials
            .iter()
            .enumerate()
            .map(|(slot, m)| (m.index, slot))
            .collect()
    }
}

/// Something that can produce a [`Scene`]
pub trait SceneSource {
    fn load(&self) -> Result<Scene>;
}

/// Destination for finished files
///
/// Paths are relative to the sink's root. Writers only receive complete
/// buffers.
pub trait OutputSink {
    fn write(&mut self, relative_path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Writes files below a directory, creating parent directories as needed
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputSink for DirectorySink {
    fn write(&mut self, relative_path: &Path, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write: {:?}", path))?;
        tracing::debug!("Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}

/// Keeps written files in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(Vec::as_slice)
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, relative_path: &Path, bytes: &[u8]) -> Result<()> {
        self.files.insert(relative_path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}
