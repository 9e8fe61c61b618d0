//! Zone manifest parsing and build orchestration
//!
//! Parses zone.toml and drives a full export. Relative paths are resolved
//! against the manifest's directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use wow_common::MaterialKind;

use crate::convert::{
    ConvertedZone, DEFAULT_FIRST_GROUP_ID, DEFAULT_WMO_ID, ExportIds, ExportOptions, export_scene,
};
use crate::obj::ObjSource;
use crate::partition::{DEFAULT_MAX_TRIANGLES, DEFAULT_MAX_VERTICES, PartitionStrategy};
use crate::scene::{DirectorySink, Scene, SceneSource};

#[derive(Debug, Error, PartialEq)]
pub enum ManifestError {
    #[error("zone name must not be empty")]
    EmptyZoneName,
    #[error("zone name '{0}' must not contain path separators or spaces")]
    InvalidZoneName(String),
    #[error("input scene not found: {0:?}")]
    InputNotFound(PathBuf),
    #[error("material '{0}' is overridden more than once")]
    DuplicateMaterial(String),
    #[error("material '{0}' has {1} textures but no frame delay")]
    MissingFrameDelay(String, usize),
}

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub zone: ZoneConfig,
    #[serde(default)]
    pub materials: Vec<MaterialOverride>,
    /// Directory the manifest was loaded from
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub name: String,
    pub descriptive_name: Option<String>,
    pub input: PathBuf,
    pub output: PathBuf,
    pub strategy: PartitionStrategy,
    pub max_triangles: usize,
    pub max_vertices: usize,
    pub wmo_id: u32,
    pub first_group_id: u32,
    /// Uniform scale applied to the input scene
    pub scale: f32,
    pub texture_root: Option<String>,
    pub object_root: Option<String>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            descriptive_name: None,
            input: PathBuf::from("zone.obj"),
            output: PathBuf::from("out/"),
            strategy: PartitionStrategy::default(),
            max_triangles: DEFAULT_MAX_TRIANGLES,
            max_vertices: DEFAULT_MAX_VERTICES,
            wmo_id: DEFAULT_WMO_ID,
            first_group_id: DEFAULT_FIRST_GROUP_ID,
            scale: 1.0,
            texture_root: None,
            object_root: None,
        }
    }
}

/// Per-material settings layered over what the scene loader produced
#[derive(Debug, Deserialize)]
pub struct MaterialOverride {
    pub name: String,
    #[serde(default)]
    pub kind: Option<MaterialKindConfig>,
    #[serde(default)]
    pub textures: Option<Vec<String>>,
    #[serde(default)]
    pub frame_delay_ms: Option<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialKindConfig {
    Opaque,
    AlphaBlended,
    Additive,
    Invisible,
    Boundary,
}

impl From<MaterialKindConfig> for MaterialKind {
    fn from(kind: MaterialKindConfig) -> Self {
        match kind {
            MaterialKindConfig::Opaque => MaterialKind::Opaque,
            MaterialKindConfig::AlphaBlended => MaterialKind::AlphaBlended,
            MaterialKindConfig::Additive => MaterialKind::Additive,
            MaterialKindConfig::Invisible => MaterialKind::Invisible,
            MaterialKindConfig::Boundary => MaterialKind::Boundary,
        }
    }
}

impl Manifest {
    pub fn input_path(&self) -> PathBuf {
        self.base_dir.join(&self.zone.input)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.base_dir.join(&self.zone.output)
    }

    pub fn to_options(&self) -> ExportOptions {
        let mut options = ExportOptions::new(&self.zone.name);
        if let Some(name) = &self.zone.descriptive_name {
            options.descriptive_name = name.clone();
        }
        if let Some(root) = &self.zone.texture_root {
            options.texture_root = root.clone();
        }
        if let Some(root) = &self.zone.object_root {
            options.object_root = root.clone();
        }
        options.strategy = self.zone.strategy;
        options.limits.max_triangles = self.zone.max_triangles;
        options.limits.max_vertices = self.zone.max_vertices;
        options
    }

    pub fn ids(&self) -> ExportIds {
        ExportIds::new(self.zone.wmo_id, self.zone.first_group_id)
    }

    /// Apply material overrides by name; returns how many matched
    pub fn apply_overrides(&self, scene: &mut Scene) -> usize {
        let mut applied = 0;
        for material_override in &self.materials {
            let Some(material) = scene
                .materials
                .iter_mut()
                .find(|m| m.name == material_override.name)
            else {
                tracing::warn!(
                    "Material override '{}' matches nothing in the scene",
                    material_override.name
                );
                continue;
            };
            if let Some(kind) = material_override.kind {
                material.kind = kind.into();
            }
            if let Some(textures) = &material_override.textures {
                material.textures = textures.clone();
            }
            if let Some(delay) = material_override.frame_delay_ms {
                material.frame_delay_ms = delay;
            }
            applied += 1;
        }
        applied
    }
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let mut manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}

/// Validate a manifest without building
pub fn validate(manifest: &Manifest) -> Result<(), ManifestError> {
    let name = &manifest.zone.name;
    if name.is_empty() {
        return Err(ManifestError::EmptyZoneName);
    }
    if name.contains(['/', '\\', ' ']) {
        return Err(ManifestError::InvalidZoneName(name.clone()));
    }

    let input = manifest.input_path();
    if !input.exists() {
        return Err(ManifestError::InputNotFound(input));
    }

    for (i, material) in manifest.materials.iter().enumerate() {
        if manifest.materials[..i].iter().any(|m| m.name == material.name) {
            return Err(ManifestError::DuplicateMaterial(material.name.clone()));
        }
        if let Some(textures) = &material.textures
            && textures.len() > 1
            && material.frame_delay_ms.unwrap_or(0) == 0
        {
            return Err(ManifestError::MissingFrameDelay(
                material.name.clone(),
                textures.len(),
            ));
        }
    }
    Ok(())
}

/// Load, convert and write the zone described by `manifest`
pub fn build(manifest: &Manifest, output_override: Option<&Path>) -> Result<ConvertedZone> {
    validate(manifest)?;

    let mut scene = ObjSource::new(manifest.input_path())
        .with_scale(manifest.zone.scale)
        .load()?;
    let applied = manifest.apply_overrides(&mut scene);
    tracing::debug!("Applied {} material overrides", applied);

    let output = output_override.map_or_else(|| manifest.output_dir(), Path::to_path_buf);
    let mut sink = DirectorySink::new(&output);
    let converted = export_scene(&scene, &manifest.to_options(), &manifest.ids(), &mut sink)
        .with_context(|| format!("Failed to export zone '{}'", manifest.zone.name))?;

    for diagnostic in &converted.diagnostics {
        tracing::debug!("{}", diagnostic);
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wow_common::Material;

    const MANIFEST: &str = r#"
[zone]
name = "lakeshire"
descriptive_name = "Lakeshire Docks"
input = "lake.obj"
strategy = "by-material"
max_triangles = 500

[[materials]]
name = "water"
kind = "additive"
textures = ["water01.png", "water02.png"]
frame_delay_ms = 120

[[materials]]
name = "fence"
kind = "invisible"
"#;

    fn parse(text: &str) -> Manifest {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let manifest = parse(MANIFEST);
        assert_eq!(manifest.zone.strategy, PartitionStrategy::ByMaterial);
        assert_eq!(manifest.zone.max_triangles, 500);
        assert_eq!(manifest.zone.max_vertices, DEFAULT_MAX_VERTICES);
        assert_eq!(manifest.zone.wmo_id, DEFAULT_WMO_ID);
        assert_eq!(manifest.zone.output, PathBuf::from("out/"));
        assert_eq!(manifest.materials.len(), 2);
    }

    #[test]
    fn test_options_from_zone() {
        let options = parse(MANIFEST).to_options();
        assert_eq!(options.zone_name, "lakeshire");
        assert_eq!(options.descriptive_name, "Lakeshire Docks");
        assert_eq!(options.limits.max_triangles, 500);
        assert_eq!(options.texture_root, "WORLD\\ZONES\\LAKESHIRE\\TEXTURES");
    }

    #[test]
    fn test_overrides_applied_by_name() {
        let manifest = parse(MANIFEST);
        let mut scene = Scene {
            materials: vec![
                Material::new("water", 0, vec!["water".into()]),
                Material::new("fence", 1, vec!["fence".into()]),
                Material::new("stone", 2, vec!["stone".into()]),
            ],
            ..Default::default()
        };

        assert_eq!(manifest.apply_overrides(&mut scene), 2);
        assert!(scene.materials[0].is_animated());
        assert_eq!(scene.materials[0].frame_delay_ms, 120);
        assert_eq!(scene.materials[0].kind, MaterialKind::Additive);
        assert!(!scene.materials[1].is_renderable());
        assert_eq!(scene.materials[2].kind, MaterialKind::Opaque);
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zone.toml");
        std::fs::write(&path, MANIFEST).unwrap();
        let mut manifest = load_manifest(&path).unwrap();
        assert_eq!(
            validate(&manifest),
            Err(ManifestError::InputNotFound(dir.path().join("lake.obj")))
        );

        std::fs::write(dir.path().join("lake.obj"), "").unwrap();
        assert_eq!(validate(&manifest), Ok(()));

        manifest.materials[0].frame_delay_ms = None;
        assert_eq!(
            validate(&manifest),
            Err(ManifestError::MissingFrameDelay("water".into(), 2))
        );

        manifest.zone.name = "lake shire".into();
        assert_eq!(
            validate(&manifest),
            Err(ManifestError::InvalidZoneName("lake shire".into()))
        );
    }

    #[test]
    fn test_duplicate_override_rejected() {
        let mut manifest = parse(MANIFEST);
        manifest.materials[1].name = "water".into();
        manifest.base_dir = std::env::temp_dir();
        manifest.zone.input = PathBuf::new();
        assert_eq!(
            validate(&manifest),
            Err(ManifestError::DuplicateMaterial("water".into()))
        );
    }

    #[test]
    fn test_build_writes_zone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lake.obj"),
            "v 0 0 0\nv 4 0 0\nv 4 0 4\nv 0 0 4\nusemtl stone\nf 1 2 3 4\n",
        )
        .unwrap();
        let path = dir.path().join("zone.toml");
        std::fs::write(&path, MANIFEST).unwrap();

        let manifest = load_manifest(&path).unwrap();
        let converted = build(&manifest, None).unwrap();
        assert_eq!(converted.group_count(), 1);
        assert!(dir.path().join("out/lakeshire.wmo").exists());
        assert!(dir.path().join("out/lakeshire_000.wmo").exists());
    }
}
