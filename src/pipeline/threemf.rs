//! Built-in 3MF reader: OPC package → model XML → [`Scene`].
//!
//! Only the parts of 3MF that affect geometry and colour are interpreted:
//! the core mesh/component/build elements, `<basematerials>`, and the
//! materials extension's `<colorgroup>`. Everything else (textures, beam
//! lattices, slice stacks, production paths) is skipped. Element and
//! attribute names are matched by local name so namespace prefixes do not
//! matter.

use crate::error::ConvertError;
use crate::output::ModelMetadata;
use crate::scene::{linear_rgba, Material, Scene, SceneMesh};
use glam::{Affine3A, Vec3, Vec3A};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Package-root relationships part.
const ROOT_RELS: &str = "_rels/.rels";
/// Where producers put the model part when the relationships say nothing.
const DEFAULT_MODEL_PART: &str = "3D/3dmodel.model";
/// Relationship type suffix that marks the 3D model part.
const MODEL_REL_SUFFIX: &str = "/3dmodel";
/// Component nesting beyond this is treated as a reference cycle.
const MAX_COMPONENT_DEPTH: usize = 32;

// ── Model ────────────────────────────────────────────────────────────────

/// The parsed contents of a 3MF model part.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub unit: String,
    pub metadata: BTreeMap<String, String>,
    pub base_materials: HashMap<u32, Vec<BaseMaterial>>,
    /// Colour groups, sRGB RGBA in `0.0..=1.0`.
    pub color_groups: HashMap<u32, Vec<[f32; 4]>>,
    pub objects: HashMap<u32, Object>,
    pub build: Vec<BuildItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseMaterial {
    pub name: String,
    /// sRGB RGBA in `0.0..=1.0`.
    pub color: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct Object {
    pub id: u32,
    pub name: Option<String>,
    pub pid: Option<u32>,
    pub pindex: Option<u32>,
    pub content: ObjectContent,
}

#[derive(Debug, Clone)]
pub enum ObjectContent {
    Mesh(MeshData),
    Components(Vec<Component>),
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<Triangle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v: [u32; 3],
    pub pid: Option<u32>,
    pub p1: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct Component {
    pub object_id: u32,
    pub transform: Affine3A,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildItem {
    pub object_id: u32,
    pub transform: Affine3A,
}

// ── Public entry points ──────────────────────────────────────────────────

/// Load a 3MF file straight into a [`Scene`].
pub fn load_scene(path: &Path) -> Result<Scene, ConvertError> {
    let model = read_model(path)?;
    let scene = model.to_scene(path)?;
    info!(
        "3MF loaded: {} meshes, {} vertices, {} triangles, {} materials",
        scene.meshes.len(),
        scene.vertex_count(),
        scene.triangle_count(),
        scene.materials.len()
    );
    Ok(scene)
}

/// Read and parse the model part of a 3MF package.
pub fn read_model(path: &Path) -> Result<Model, ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::corrupt(path, e.to_string()))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| ConvertError::corrupt(path, format!("ZIP: {e}")))?;

    let part = find_model_part(&mut archive);
    debug!("3MF model part: {part}");

    let xml = read_part(&mut archive, &part)
        .ok_or_else(|| ConvertError::corrupt(path, format!("model part '{part}' not found")))?;

    parse_model_xml(&xml).map_err(|detail| ConvertError::corrupt(path, detail))
}

/// Summarise a 3MF without building a scene.
pub fn inspect_model(path: &Path) -> Result<ModelMetadata, ConvertError> {
    let model = read_model(path)?;

    let (mut vertex_count, mut triangle_count) = (0, 0);
    for object in model.objects.values() {
        if let ObjectContent::Mesh(mesh) = &object.content {
            vertex_count += mesh.vertices.len();
            triangle_count += mesh.triangles.len();
        }
    }

    let mut group_ids: Vec<_> = model.base_materials.keys().copied().collect();
    group_ids.sort_unstable();
    let mut materials: Vec<Material> = group_ids
        .iter()
        .flat_map(|id| model.base_materials[id].iter())
        .map(|b| Material::new(b.name.clone(), linearise(b.color)))
        .collect();

    let mut color_ids: Vec<_> = model.color_groups.keys().copied().collect();
    color_ids.sort_unstable();
    for id in &color_ids {
        for (i, c) in model.color_groups[id].iter().enumerate() {
            materials.push(Material::new(format!("color_{id}_{i}"), linearise(*c)));
        }
    }

    Ok(ModelMetadata {
        unit: model.unit.clone(),
        metadata: model.metadata.clone(),
        object_count: model.objects.len(),
        build_item_count: model.build.len(),
        vertex_count,
        triangle_count,
        base_material_count: model.base_materials.len(),
        color_group_count: model.color_groups.len(),
        materials,
    })
}

// ── Package access ───────────────────────────────────────────────────────

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let exact = archive.index_for_name(name).or_else(|| {
        // Producers disagree on case; OPC part names are case-insensitive.
        (0..archive.len()).find(|&i| {
            archive
                .name_for_index(i)
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    })?;

    let mut file = archive.by_index(exact).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Locate the model part through the root relationships, else the default.
fn find_model_part<R: Read + Seek>(archive: &mut ZipArchive<R>) -> String {
    if let Some(rels) = read_part(archive, ROOT_RELS) {
        if let Some(target) = model_target_from_rels(&rels) {
            return target;
        }
        warn!("No 3D model relationship in {ROOT_RELS}; trying {DEFAULT_MODEL_PART}");
    }
    DEFAULT_MODEL_PART.to_string()
}

fn model_target_from_rels(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let rel_type = attr(&e, b"Type").ok().flatten().unwrap_or_default();
                if rel_type.ends_with(MODEL_REL_SUFFIX) {
                    if let Ok(Some(target)) = attr(&e, b"Target") {
                        return Some(target.trim_start_matches('/').to_string());
                    }
                }
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                warn!("XML parse error in {ROOT_RELS}: {e}");
                return None;
            }
            _ => {}
        }
        buf.clear();
    }
}

// ── Model XML ────────────────────────────────────────────────────────────

#[derive(Default)]
struct ObjectBuilder {
    id: u32,
    name: Option<String>,
    pid: Option<u32>,
    pindex: Option<u32>,
    mesh: Option<MeshData>,
    components: Vec<Component>,
}

#[derive(Default)]
struct ModelParser {
    model: Model,
    object: Option<ObjectBuilder>,
    base_group: Option<(u32, Vec<BaseMaterial>)>,
    color_group: Option<(u32, Vec<[f32; 4]>)>,
    metadata_key: Option<String>,
    metadata_text: String,
    in_build: bool,
}

/// Parse the model XML of a 3MF package.
pub fn parse_model_xml(xml: &str) -> Result<Model, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut parser = ModelParser::default();
    parser.model.unit = "millimeter".to_string();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => parser.open(&e)?,
            Event::Empty(e) => {
                parser.open(&e)?;
                parser.close(e.local_name().as_ref())?;
            }
            Event::End(e) => parser.close(e.local_name().as_ref())?,
            Event::Text(t) if parser.metadata_key.is_some() => {
                let text = t.unescape().map_err(|e| format!("metadata text: {e}"))?;
                parser.metadata_text.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if parser.object.is_some() {
        return Err("unterminated <object> element".into());
    }
    Ok(parser.model)
}

impl ModelParser {
    fn open(&mut self, e: &BytesStart) -> Result<(), String> {
        match e.local_name().as_ref() {
            b"model" => {
                if let Some(unit) = attr(e, b"unit")? {
                    self.model.unit = unit;
                }
            }
            b"metadata" if self.object.is_none() && !self.in_build => {
                self.metadata_key = attr(e, b"name")?;
                self.metadata_text.clear();
            }
            b"basematerials" => {
                self.base_group = Some((required(e, b"id")?, Vec::new()));
            }
            b"base" => {
                let name = attr(e, b"name")?.unwrap_or_default();
                let color = required_color(e, b"displaycolor")?;
                if let Some((_, group)) = self.base_group.as_mut() {
                    group.push(BaseMaterial { name, color });
                }
            }
            b"colorgroup" => {
                self.color_group = Some((required(e, b"id")?, Vec::new()));
            }
            b"color" => {
                let color = required_color(e, b"color")?;
                if let Some((_, group)) = self.color_group.as_mut() {
                    group.push(color);
                }
            }
            b"object" => {
                self.object = Some(ObjectBuilder {
                    id: required(e, b"id")?,
                    name: attr(e, b"name")?,
                    pid: number(e, b"pid")?,
                    pindex: number(e, b"pindex")?,
                    ..Default::default()
                });
            }
            b"mesh" => {
                self.current_object("mesh")?.mesh = Some(MeshData::default());
            }
            b"vertex" => {
                let vertex = [required(e, b"x")?, required(e, b"y")?, required(e, b"z")?];
                self.current_mesh("vertex")?.vertices.push(vertex);
            }
            b"triangle" => {
                let triangle = Triangle {
                    v: [required(e, b"v1")?, required(e, b"v2")?, required(e, b"v3")?],
                    pid: number(e, b"pid")?,
                    p1: number(e, b"p1")?,
                };
                self.current_mesh("triangle")?.triangles.push(triangle);
            }
            b"component" => {
                let component = Component {
                    object_id: required(e, b"objectid")?,
                    transform: optional_transform(e)?,
                };
                self.current_object("component")?.components.push(component);
            }
            b"build" => self.in_build = true,
            b"item" if self.in_build => {
                self.model.build.push(BuildItem {
                    object_id: required(e, b"objectid")?,
                    transform: optional_transform(e)?,
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, local_name: &[u8]) -> Result<(), String> {
        match local_name {
            b"metadata" => {
                if let Some(key) = self.metadata_key.take() {
                    let value = std::mem::take(&mut self.metadata_text).trim().to_string();
                    self.model.metadata.insert(key, value);
                }
            }
            b"basematerials" => {
                if let Some((id, group)) = self.base_group.take() {
                    self.model.base_materials.insert(id, group);
                }
            }
            b"colorgroup" => {
                if let Some((id, group)) = self.color_group.take() {
                    self.model.color_groups.insert(id, group);
                }
            }
            b"object" => {
                let Some(b) = self.object.take() else {
                    return Ok(());
                };
                let content = match b.mesh {
                    Some(mesh) => ObjectContent::Mesh(mesh),
                    None if !b.components.is_empty() => ObjectContent::Components(b.components),
                    None => ObjectContent::Mesh(MeshData::default()),
                };
                let object = Object {
                    id: b.id,
                    name: b.name,
                    pid: b.pid,
                    pindex: b.pindex,
                    content,
                };
                if self.model.objects.insert(b.id, object).is_some() {
                    return Err(format!("duplicate object id {}", b.id));
                }
            }
            b"build" => self.in_build = false,
            _ => {}
        }
        Ok(())
    }

    fn current_object(&mut self, element: &str) -> Result<&mut ObjectBuilder, String> {
        self.object
            .as_mut()
            .ok_or_else(|| format!("<{element}> outside of <object>"))
    }

    fn current_mesh(&mut self, element: &str) -> Result<&mut MeshData, String> {
        self.current_object(element)?
            .mesh
            .as_mut()
            .ok_or_else(|| format!("<{element}> outside of <mesh>"))
    }
}

// ── Attribute helpers ────────────────────────────────────────────────────

fn attr(e: &BytesStart, key: &[u8]) -> Result<Option<String>, String> {
    for a in e.attributes() {
        let a = a.map_err(|err| format!("malformed attribute: {err}"))?;
        if a.key.local_name().as_ref() == key {
            let value = a
                .unescape_value()
                .map_err(|err| format!("attribute value: {err}"))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn number<T: FromStr>(e: &BytesStart, key: &[u8]) -> Result<Option<T>, String> {
    match attr(e, key)? {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            format!(
                "<{}> attribute {}='{raw}' is not a number",
                String::from_utf8_lossy(e.local_name().as_ref()),
                String::from_utf8_lossy(key)
            )
        }),
        None => Ok(None),
    }
}

fn required<T: FromStr>(e: &BytesStart, key: &[u8]) -> Result<T, String> {
    number(e, key)?.ok_or_else(|| {
        format!(
            "<{}> is missing required attribute '{}'",
            String::from_utf8_lossy(e.local_name().as_ref()),
            String::from_utf8_lossy(key)
        )
    })
}

fn required_color(e: &BytesStart, key: &[u8]) -> Result<[f32; 4], String> {
    let raw = attr(e, key)?.unwrap_or_default();
    parse_color(&raw).ok_or_else(|| format!("invalid colour '{raw}'"))
}

fn optional_transform(e: &BytesStart) -> Result<Affine3A, String> {
    match attr(e, b"transform")? {
        Some(raw) => parse_transform(&raw),
        None => Ok(Affine3A::IDENTITY),
    }
}

/// Parse `#RRGGBB` or `#RRGGBBAA` into sRGB RGBA in `0.0..=1.0`.
pub fn parse_color(raw: &str) -> Option<[f32; 4]> {
    let hex = raw.trim().strip_prefix('#')?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Some([
        f32::from(channel(0)?) / 255.0,
        f32::from(channel(2)?) / 255.0,
        f32::from(channel(4)?) / 255.0,
        f32::from(alpha) / 255.0,
    ])
}

/// Parse a 3MF `transform` attribute: twelve numbers, a row-major 4×3
/// matrix applied to row vectors (`p' = [x y z 1] · M`).
pub fn parse_transform(raw: &str) -> Result<Affine3A, String> {
    let m = raw
        .split_whitespace()
        .map(f32::from_str)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("transform '{raw}' contains a non-number"))?;
    if m.len() != 12 {
        return Err(format!("transform needs 12 values, got {}", m.len()));
    }
    Ok(Affine3A::from_cols(
        Vec3A::new(m[0], m[1], m[2]),
        Vec3A::new(m[3], m[4], m[5]),
        Vec3A::new(m[6], m[7], m[8]),
        Vec3A::new(m[9], m[10], m[11]),
    ))
}

fn linearise(srgb: [f32; 4]) -> [f32; 4] {
    linear_rgba([srgb[0], srgb[1], srgb[2]], srgb[3])
}

// ── Model → Scene ────────────────────────────────────────────────────────

struct SceneBuilder<'a> {
    model: &'a Model,
    scene: Scene,
    /// `(pid, index)` → position in `scene.materials`.
    materials: HashMap<(u32, u32), usize>,
}

impl Model {
    /// Flatten the build into world-space meshes.
    ///
    /// `source` is only used to label errors.
    pub fn to_scene(&self, source: &Path) -> Result<Scene, ConvertError> {
        if self.build.is_empty() {
            return Err(ConvertError::corrupt(source, "model has no <build> items"));
        }

        let mut builder = SceneBuilder {
            model: self,
            scene: Scene::default(),
            materials: HashMap::new(),
        };
        for item in &self.build {
            builder
                .emit(item.object_id, item.transform, 0)
                .map_err(|detail| ConvertError::corrupt(source, detail))?;
        }

        let mut scene = builder.scene;
        scene.prune_empty();
        if scene.is_empty() {
            return Err(ConvertError::EmptyScene {
                path: source.to_path_buf(),
            });
        }
        Ok(scene)
    }
}

impl SceneBuilder<'_> {
    fn emit(&mut self, object_id: u32, transform: Affine3A, depth: usize) -> Result<(), String> {
        if depth > MAX_COMPONENT_DEPTH {
            return Err(format!(
                "components nest deeper than {MAX_COMPONENT_DEPTH} levels at object {object_id} (reference cycle?)"
            ));
        }
        let object = self
            .model
            .objects
            .get(&object_id)
            .ok_or_else(|| format!("reference to unknown object id {object_id}"))?;

        match &object.content {
            ObjectContent::Components(components) => {
                for c in components {
                    self.emit(c.object_id, transform * c.transform, depth + 1)?;
                }
                Ok(())
            }
            ObjectContent::Mesh(mesh) => self.emit_mesh(object, mesh, transform),
        }
    }

    fn emit_mesh(&mut self, object: &Object, mesh: &MeshData, transform: Affine3A) -> Result<(), String> {
        let vertex_total = mesh.vertices.len();

        // Triangle indices grouped by resolved material, in first-seen order.
        let mut groups: Vec<(Option<usize>, Vec<usize>)> = Vec::new();
        for (t, tri) in mesh.triangles.iter().enumerate() {
            if let Some(&bad) = tri.v.iter().find(|&&v| v as usize >= vertex_total) {
                return Err(format!(
                    "object {}: triangle {t} references vertex {bad}, but only {vertex_total} vertices exist",
                    object.id
                ));
            }
            let material = match tri.pid.or(object.pid) {
                Some(pid) => self.material_for(pid, tri.p1.or(object.pindex).unwrap_or(0)),
                None => None,
            };
            match groups.iter_mut().find(|(m, _)| *m == material) {
                Some((_, tris)) => tris.push(t),
                None => groups.push((material, vec![t])),
            }
        }

        // Mirroring transforms flip the winding order.
        let mirrored = transform.matrix3.determinant() < 0.0;
        let base_name = object
            .name
            .clone()
            .unwrap_or_else(|| format!("object_{}", object.id));
        let split = groups.len() > 1;

        for (n, (material, tris)) in groups.into_iter().enumerate() {
            let mut remap: HashMap<u32, u32> = HashMap::new();
            let mut out = SceneMesh {
                name: if split {
                    format!("{base_name}_{n}")
                } else {
                    base_name.clone()
                },
                material,
                ..Default::default()
            };

            for t in tris {
                let mut v = mesh.triangles[t].v;
                if mirrored {
                    v.swap(1, 2);
                }
                for src in v {
                    let idx = *remap.entry(src).or_insert_with(|| {
                        let p = transform.transform_point3(Vec3::from(mesh.vertices[src as usize]));
                        out.positions.push(p.to_array());
                        (out.positions.len() - 1) as u32
                    });
                    out.indices.push(idx);
                }
            }

            debug!(
                "Object {} → mesh '{}' ({} vertices, {} triangles)",
                object.id,
                out.name,
                out.vertex_count(),
                out.triangle_count()
            );
            self.scene.meshes.push(out);
        }
        Ok(())
    }

    fn material_for(&mut self, pid: u32, index: u32) -> Option<usize> {
        if let Some(&existing) = self.materials.get(&(pid, index)) {
            return Some(existing);
        }

        let material = if let Some(group) = self.model.base_materials.get(&pid) {
            let base = group.get(index as usize)?;
            let name = if base.name.is_empty() {
                format!("material_{pid}_{index}")
            } else {
                base.name.clone()
            };
            Material::new(name, linearise(base.color))
        } else if let Some(group) = self.model.color_groups.get(&pid) {
            Material::new(format!("color_{pid}_{index}"), linearise(*group.get(index as usize)?))
        } else {
            debug!("Property group {pid} is not a colour source; using default material");
            return None;
        };

        let slot = self.scene.materials.len();
        self.scene.materials.push(material);
        self.materials.insert((pid, index), slot);
        Some(slot)
    }
}
