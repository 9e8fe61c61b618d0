//! Wavefront OBJ scene loader
//!
//! Supports `v` (with optional `r g b` vertex colors), `vt`, `vn`, `f` with
//! fan triangulation, `usemtl`, `g`/`o` and `mtllib` (`newmtl` + `map_Kd`).
//! OBJ is Y-up; positions and normals are rotated into the Z-up frame and V
//! is flipped.

use anyhow::{Context, Result, bail};
use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use std::path::{Path, PathBuf};

use wow_common::{Material, Triangle, VertexAttributes};

use crate::scene::{Scene, SceneSource};

/// Material used by faces that appear before any `usemtl`
pub const DEFAULT_MATERIAL: &str = "default";

/// Loads a scene from an `.obj` file
#[derive(Debug, Clone)]
pub struct ObjSource {
    path: PathBuf,
    scale: f32,
}

impl ObjSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scale: 1.0,
        }
    }

    /// Uniform scale applied to positions
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

impl SceneSource for ObjSource {
    fn load(&self) -> Result<Scene> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read OBJ: {:?}", self.path))?;

        let base = self.path.parent().unwrap_or(Path::new("."));
        let mut textures = HashMap::new();
        for line in text.lines() {
            if let Some(library) = line.trim().strip_prefix("mtllib ") {
                let mtl_path = base.join(library.trim());
                match std::fs::read_to_string(&mtl_path) {
                    Ok(mtl) => textures.extend(parse_mtl(&mtl)),
                    Err(e) => tracing::warn!("Skipping material library {:?}: {}", mtl_path, e),
                }
            }
        }

        let scene = parse_obj(&text, &textures, self.scale)
            .with_context(|| format!("Failed to parse OBJ: {:?}", self.path))?;
        tracing::info!(
            "Loaded {:?}: {} vertices, {} triangles, {} materials",
            self.path,
            scene.attributes.len(),
            scene.triangles.len(),
            scene.materials.len()
        );
        Ok(scene)
    }
}

/// `newmtl` name -> `map_Kd` texture
pub fn parse_mtl(text: &str) -> HashMap<String, String> {
    let mut textures = HashMap::new();
    let mut current: Option<&str> = None;
    for line in text.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("newmtl ") {
            current = Some(name.trim());
        } else if let (Some(texture), Some(name)) = (line.strip_prefix("map_Kd "), current) {
            // keep the file name only, MTL paths are usually relative to the exporter
            let texture = texture.trim();
            let file = texture.rsplit(['/', '\\']).next().unwrap_or(texture);
            textures.insert(name.to_string(), file.to_string());
        }
    }
    textures
}

/// Parse OBJ text into a scene.
///
/// `textures` maps material names to texture names; materials without an
/// entry use their own name as texture, except [`DEFAULT_MATERIAL`], which
/// has none.
pub fn parse_obj(text: &str, textures: &HashMap<String, String>, scale: f32) -> Result<Scene> {
    let mut parser = ObjParser::new(textures, scale);
    for (number, line) in text.lines().enumerate() {
        parser
            .line(line)
            .with_context(|| format!("line {}: {:?}", number + 1, line.trim()))?;
    }
    Ok(parser.finish())
}

type VertexKey = (usize, Option<usize>, Option<usize>);

struct ObjParser<'a> {
    textures: &'a HashMap<String, String>,
    scale: f32,

    positions: Vec<Vec3>,
    colors: Vec<Option<[u8; 4]>>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,

    vertices: HashMap<VertexKey, u32>,
    keys: Vec<VertexKey>,
    triangles: Vec<Triangle>,
    source_groups: Vec<u32>,

    materials: Vec<Material>,
    material_ids: HashMap<String, i32>,
    current_material: Option<i32>,
    group_ids: HashMap<String, u32>,
    current_group: u32,
}

impl<'a> ObjParser<'a> {
    fn new(textures: &'a HashMap<String, String>, scale: f32) -> Self {
        Self {
            textures,
            scale,
            positions: Vec::new(),
            colors: Vec::new(),
            uvs: Vec::new(),
            normals: Vec::new(),
            vertices: HashMap::new(),
            keys: Vec::new(),
            triangles: Vec::new(),
            source_groups: Vec::new(),
            materials: Vec::new(),
            material_ids: HashMap::new(),
            current_material: None,
            group_ids: HashMap::new(),
            current_group: 0,
        }
    }

    fn line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts[0] {
            "v" => {
                let [x, y, z] = parse_floats::<3>(&parts[1..])?;
                self.positions.push(y_up_to_z_up(x, y, z) * self.scale);
                self.colors.push(match parts.len() {
                    7 => {
                        let [r, g, b] = parse_floats::<3>(&parts[4..])?;
                        Some([unit_to_u8(r), unit_to_u8(g), unit_to_u8(b), 255])
                    }
                    _ => None,
                });
            }
            "vt" => {
                let [u, v] = parse_floats::<2>(&parts[1..])?;
                self.uvs.push(Vec2::new(u, 1.0 - v));
            }
            "vn" => {
                let [x, y, z] = parse_floats::<3>(&parts[1..])?;
                self.normals.push(y_up_to_z_up(x, y, z).normalize_or_zero());
            }
            "f" => self.face(&parts[1..])?,
            "usemtl" => {
                let name = parts.get(1).copied().unwrap_or(DEFAULT_MATERIAL);
                self.current_material = Some(self.material(name));
            }
            "g" | "o" => {
                let name = parts.get(1..).map(|p| p.join(" ")).unwrap_or_default();
                let next = self.group_ids.len() as u32;
                self.current_group = *self.group_ids.entry(name).or_insert(next);
            }
            // smoothing groups, mtllib (handled by the loader) and the rest
            _ => {}
        }
        Ok(())
    }

    fn face(&mut self, refs: &[&str]) -> Result<()> {
        if refs.len() < 3 {
            bail!("face needs at least 3 vertices, got {}", refs.len());
        }
        let corners = refs
            .iter()
            .map(|r| self.corner(r))
            .collect::<Result<Vec<u32>>>()?;
        let material = match self.current_material {
            Some(material) => material,
            None => self.material(DEFAULT_MATERIAL),
        };

        for i in 1..corners.len() - 1 {
            self.triangles
                .push(Triangle::new([corners[0], corners[i], corners[i + 1]], material));
            self.source_groups.push(self.current_group);
        }
        Ok(())
    }

    /// Resolve `v`, `v/vt`, `v//vn` or `v/vt/vn` to a deduplicated vertex
    fn corner(&mut self, reference: &str) -> Result<u32> {
        let mut fields = reference.split('/');
        let position = fields.next().unwrap_or_default();
        let v = resolve_index(position, self.positions.len(), "position")?;
        let vt = match fields.next() {
            Some(s) if !s.is_empty() => Some(resolve_index(s, self.uvs.len(), "texture coordinate")?),
            _ => None,
        };
        let vn = match fields.next() {
            Some(s) if !s.is_empty() => Some(resolve_index(s, self.normals.len(), "normal")?),
            _ => None,
        };

        let key = (v, vt, vn);
        let next = self.keys.len() as u32;
        let index = *self.vertices.entry(key).or_insert(next);
        if index == next {
            self.keys.push(key);
        }
        Ok(index)
    }

    fn material(&mut self, name: &str) -> i32 {
        if let Some(&id) = self.material_ids.get(name) {
            return id;
        }
        let id = self.materials.len() as i32;
        let textures = match self.textures.get(name) {
            Some(texture) => vec![texture.clone()],
            None if name == DEFAULT_MATERIAL => Vec::new(),
            None => vec![name.to_string()],
        };
        self.materials.push(Material::new(name, id as u32, textures));
        self.material_ids.insert(name.to_string(), id);
        id
    }

    fn finish(self) -> Scene {
        let has_colors = self.colors.iter().any(Option::is_some);
        let mut attributes = VertexAttributes::with_capacity(self.keys.len(), has_colors);
        for &(v, vt, vn) in &self.keys {
            attributes.positions.push(self.positions[v]);
            attributes.uvs.push(vt.map_or(Vec2::ZERO, |i| self.uvs[i]));
            attributes.normals.push(vn.map_or(Vec3::Z, |i| self.normals[i]));
            if let Some(colors) = attributes.colors.as_mut() {
                colors.push(self.colors[v].unwrap_or([255; 4]));
            }
        }

        Scene {
            attributes,
            triangles: self.triangles,
            materials: self.materials,
            source_groups: self.source_groups,
        }
    }
}

fn parse_floats<const N: usize>(fields: &[&str]) -> Result<[f32; N]> {
    if fields.len() < N {
        bail!("expected {} numbers, got {}", N, fields.len());
    }
    let mut out = [0.0; N];
    for (slot, field) in out.iter_mut().zip(fields) {
        *slot = field
            .parse()
            .with_context(|| format!("invalid number {:?}", field))?;
    }
    Ok(out)
}

/// 1-based or negative (relative) OBJ index to a 0-based index
fn resolve_index(field: &str, len: usize, what: &str) -> Result<usize> {
    let raw: i64 = field
        .parse()
        .with_context(|| format!("invalid {} index {:?}", what, field))?;
    let resolved = match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => len.checked_sub(r.unsigned_abs() as usize),
    };
    match resolved {
        Some(index) if index < len => Ok(index),
        _ => bail!("{} index {} out of range ({} defined)", what, raw, len),
    }
}

fn y_up_to_z_up(x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(x, -z, y)
}

fn unit_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# two materials, two groups
v 0 0 0
v 1 0 0
v 1 0 -1
v 0 0 -1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
g floor
usemtl stone
f 1/1/1 2/2/1 3/3/1 4/4/1
g wall
usemtl grass
f 1/1/1 3/3/1 4/4/1
";

    fn parse(text: &str) -> Scene {
        parse_obj(text, &HashMap::new(), 1.0).unwrap()
    }

    #[test]
    fn test_quad_fan_triangulated_and_deduplicated() {
        let scene = parse(QUAD);
        assert_eq!(scene.attributes.len(), 4);
        assert_eq!(scene.triangles.len(), 3);
        assert_eq!(scene.triangles[0].indices, [0, 1, 2]);
        assert_eq!(scene.triangles[1].indices, [0, 2, 3]);
        assert_eq!(scene.triangles[2].indices, [0, 2, 3]);
        assert!(scene.attributes.validate().is_ok());
    }

    #[test]
    fn test_axes_converted_to_z_up() {
        let scene = parse(QUAD);
        assert_eq!(scene.attributes.positions[2], Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(scene.attributes.normals[0], Vec3::Z);
        assert_eq!(scene.attributes.uvs[2], Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_materials_and_groups_in_appearance_order() {
        let scene = parse(QUAD);
        let names: Vec<&str> = scene.materials.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["stone", "grass"]);
        assert_eq!(scene.materials[1].index, 1);
        assert_eq!(scene.materials[1].textures, vec!["grass".to_string()]);
        assert_eq!(scene.triangles[2].material, 1);
        assert_eq!(scene.source_groups, vec![0, 0, 1]);
    }

    #[test]
    fn test_faces_without_material_use_untextured_default() {
        let scene = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].name, DEFAULT_MATERIAL);
        assert!(!scene.materials[0].has_texture());
    }

    #[test]
    fn test_negative_indices_and_vertex_colors() {
        let scene = parse("v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nusemtl a\nf -3 -2 -1\n");
        assert_eq!(scene.triangles[0].indices, [0, 1, 2]);
        assert_eq!(
            scene.attributes.colors,
            Some(vec![[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]])
        );
    }

    #[test]
    fn test_mtl_textures_resolved() {
        let textures = parse_mtl("newmtl stone\nKd 1 1 1\nmap_Kd textures\\cobble.png\n");
        assert_eq!(textures.get("stone").map(String::as_str), Some("cobble.png"));
        let scene = parse_obj(QUAD, &textures, 1.0).unwrap();
        assert_eq!(scene.materials[0].textures, vec!["cobble.png".to_string()]);
    }

    #[test]
    fn test_out_of_range_face_reports_line() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n", &HashMap::new(), 1.0).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("line 2"), "{message}");
        assert!(message.contains("position index 2 out of range"), "{message}");
    }

    #[test]
    fn test_loader_reads_file_and_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zone.mtl"), "newmtl stone\nmap_Kd rock.png\n").unwrap();
        std::fs::write(dir.path().join("zone.obj"), format!("mtllib zone.mtl\n{QUAD}")).unwrap();

        let scene = ObjSource::new(dir.path().join("zone.obj"))
            .with_scale(2.0)
            .load()
            .unwrap();
        assert_eq!(scene.materials[0].textures, vec!["rock.png".to_string()]);
        assert_eq!(scene.attributes.positions[1], Vec3::new(2.0, 0.0, 0.0));
    }
}
