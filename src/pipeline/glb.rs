//! GLB encoder: [`Scene`] → binary glTF 2.0.
//!
//! Layout: one buffer holding, per mesh, positions, optional normals and
//! `u32` indices, each 4-byte aligned with its own buffer view. Every
//! [`SceneMesh`] becomes one glTF mesh with a single triangle primitive and
//! one node. Materials are metallic 0 / roughness 0.5, double-sided, and
//! switch to `BLEND` when the base colour is translucent.

use crate::error::ConvertError;
use crate::scene::{Material, Scene, SceneMesh, DEFAULT_BASE_COLOR};
use glam::Quat;
use gltf_json as json;
use json::validation::{Checked::Valid, USize64};
use std::collections::BTreeMap;
use tracing::debug;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const METALLIC: f32 = 0.0;
const ROUGHNESS: f32 = 0.5;

/// Encode `scene` as a GLB document.
///
/// With `y_up`, mesh nodes hang under a root node rotated −90° about X so
/// that 3MF's +Z up becomes glTF's +Y up. Otherwise coordinates are written
/// unchanged.
pub fn export_glb(scene: &Scene, y_up: bool) -> Result<Vec<u8>, ConvertError> {
    if scene.meshes.is_empty() {
        return Err(ConvertError::ExportFailed {
            detail: "scene has no meshes".into(),
        });
    }

    let mut doc = DocumentBuilder::default();
    let mut materials: Vec<json::Material> = scene.materials.iter().map(gltf_material).collect();
    let mut default_material: Option<u32> = None;

    let mut nodes = Vec::with_capacity(scene.meshes.len() + 1);
    let mut meshes = Vec::with_capacity(scene.meshes.len());

    for mesh in &scene.meshes {
        let material = match mesh.material {
            Some(i) if i < materials.len() => i as u32,
            Some(i) => {
                return Err(ConvertError::ExportFailed {
                    detail: format!("mesh '{}' references missing material {i}", mesh.name),
                })
            }
            None => *default_material.get_or_insert_with(|| {
                materials.push(gltf_material(&Material::new("default", DEFAULT_BASE_COLOR)));
                (materials.len() - 1) as u32
            }),
        };

        let primitive = doc.push_mesh(mesh, material)?;
        let mesh_idx = meshes.len() as u32;
        meshes.push(json::Mesh {
            extensions: None,
            extras: Default::default(),
            name: Some(mesh.name.clone()),
            primitives: vec![primitive],
            weights: None,
        });
        nodes.push(node(Some(mesh.name.clone()), Some(mesh_idx), None, None));
    }

    let mesh_nodes: Vec<json::Index<json::Node>> =
        (0..nodes.len() as u32).map(json::Index::new).collect();
    let scene_roots = if y_up {
        let rotation = Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2).to_array();
        let root = nodes.len() as u32;
        nodes.push(node(
            Some("z_up_to_y_up".into()),
            None,
            Some(mesh_nodes),
            Some(json::scene::UnitQuaternion(rotation)),
        ));
        vec![json::Index::new(root)]
    } else {
        mesh_nodes
    };

    let buffer_len = doc.buffer.len();
    let root = json::Root {
        accessors: doc.accessors,
        animations: Vec::new(),
        asset: json::Asset {
            copyright: None,
            extensions: None,
            extras: Default::default(),
            generator: Some(concat!("threemf-glb ", env!("CARGO_PKG_VERSION")).to_string()),
            min_version: None,
            version: "2.0".to_string(),
        },
        buffers: vec![json::Buffer {
            byte_length: USize64(buffer_len as u64),
            extensions: None,
            extras: Default::default(),
            name: None,
            uri: None,
        }],
        buffer_views: doc.views,
        scene: Some(json::Index::new(0)),
        extensions: None,
        extras: Default::default(),
        extensions_used: Vec::new(),
        extensions_required: Vec::new(),
        cameras: Vec::new(),
        images: Vec::new(),
        materials,
        meshes,
        nodes,
        samplers: Vec::new(),
        scenes: vec![json::Scene {
            extensions: None,
            extras: Default::default(),
            name: None,
            nodes: scene_roots,
        }],
        skins: Vec::new(),
        textures: Vec::new(),
    };

    let glb = build_glb(&root, &doc.buffer)?;
    debug!(
        "GLB encoded: {} bytes ({} bytes of geometry)",
        glb.len(),
        buffer_len
    );
    Ok(glb)
}

/// Accumulates the binary buffer and the views/accessors that index it.
#[derive(Default)]
struct DocumentBuilder {
    buffer: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl DocumentBuilder {
    fn push_mesh(&mut self, mesh: &SceneMesh, material: u32) -> Result<json::mesh::Primitive, ConvertError> {
        if u32::try_from(mesh.positions.len()).is_err() {
            return Err(ConvertError::ExportFailed {
                detail: format!("mesh '{}' has too many vertices for u32 indices", mesh.name),
            });
        }
        if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= mesh.positions.len()) {
            return Err(ConvertError::ExportFailed {
                detail: format!("mesh '{}' index {bad} is out of range", mesh.name),
            });
        }

        let (min, max) = mesh.bounds().unwrap_or(([0.0; 3], [0.0; 3]));

        let mut attributes = BTreeMap::new();
        let positions = self.push_data(
            bytemuck::cast_slice(&mesh.positions),
            json::buffer::Target::ArrayBuffer,
        );
        attributes.insert(
            Valid(json::mesh::Semantic::Positions),
            self.push_accessor(
                positions,
                mesh.positions.len(),
                json::accessor::ComponentType::F32,
                json::accessor::Type::Vec3,
                Some((min.to_vec(), max.to_vec())),
            ),
        );

        if mesh.has_normals() {
            let normals = self.push_data(
                bytemuck::cast_slice(&mesh.normals),
                json::buffer::Target::ArrayBuffer,
            );
            attributes.insert(
                Valid(json::mesh::Semantic::Normals),
                self.push_accessor(
                    normals,
                    mesh.normals.len(),
                    json::accessor::ComponentType::F32,
                    json::accessor::Type::Vec3,
                    None,
                ),
            );
        }

        let indices = self.push_data(
            bytemuck::cast_slice(&mesh.indices),
            json::buffer::Target::ElementArrayBuffer,
        );
        let indices = self.push_accessor(
            indices,
            mesh.indices.len(),
            json::accessor::ComponentType::U32,
            json::accessor::Type::Scalar,
            None,
        );

        Ok(json::mesh::Primitive {
            attributes,
            extensions: None,
            extras: Default::default(),
            indices: Some(indices),
            material: Some(json::Index::new(material)),
            mode: Valid(json::mesh::Mode::Triangles),
            targets: None,
        })
    }

    /// Append `bytes` at a 4-byte boundary and describe them with a view.
    fn push_data(&mut self, bytes: &[u8], target: json::buffer::Target) -> json::Index<json::buffer::View> {
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);

        self.views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: USize64(bytes.len() as u64),
            byte_offset: Some(USize64(offset as u64)),
            byte_stride: None,
            extensions: None,
            extras: Default::default(),
            name: None,
            target: Some(Valid(target)),
        });
        json::Index::new((self.views.len() - 1) as u32)
    }

    fn push_accessor(
        &mut self,
        view: json::Index<json::buffer::View>,
        count: usize,
        component: json::accessor::ComponentType,
        kind: json::accessor::Type,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> json::Index<json::Accessor> {
        let (min, max) = match bounds {
            Some((min, max)) => (Some(json::Value::from(min)), Some(json::Value::from(max))),
            None => (None, None),
        };
        self.accessors.push(json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(USize64(0)),
            count: USize64(count as u64),
            component_type: Valid(json::accessor::GenericComponentType(component)),
            extensions: None,
            extras: Default::default(),
            name: None,
            type_: Valid(kind),
            min,
            max,
            normalized: false,
            sparse: None,
        });
        json::Index::new((self.accessors.len() - 1) as u32)
    }
}

fn gltf_material(m: &Material) -> json::Material {
    let alpha_mode = if m.base_color[3] < 1.0 {
        json::material::AlphaMode::Blend
    } else {
        json::material::AlphaMode::Opaque
    };
    json::Material {
        alpha_cutoff: None,
        alpha_mode: Valid(alpha_mode),
        double_sided: true,
        name: Some(m.name.clone()),
        pbr_metallic_roughness: json::material::PbrMetallicRoughness {
            base_color_factor: json::material::PbrBaseColorFactor(m.base_color),
            base_color_texture: None,
            metallic_factor: json::material::StrengthFactor(METALLIC),
            roughness_factor: json::material::StrengthFactor(ROUGHNESS),
            metallic_roughness_texture: None,
            extensions: None,
            extras: Default::default(),
        },
        normal_texture: None,
        occlusion_texture: None,
        emissive_texture: None,
        emissive_factor: json::material::EmissiveFactor([0.0, 0.0, 0.0]),
        extensions: None,
        extras: Default::default(),
    }
}

fn node(
    name: Option<String>,
    mesh: Option<u32>,
    children: Option<Vec<json::Index<json::Node>>>,
    rotation: Option<json::scene::UnitQuaternion>,
) -> json::Node {
    json::Node {
        camera: None,
        children,
        extensions: None,
        extras: Default::default(),
        matrix: None,
        mesh: mesh.map(json::Index::new),
        name,
        rotation,
        scale: None,
        translation: None,
        skin: None,
        weights: None,
    }
}

/// Frame the JSON and binary chunks into a GLB container.
fn build_glb(root: &json::Root, buffer: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let json_bytes = serde_json::to_vec(root).map_err(|e| ConvertError::ExportFailed {
        detail: format!("glTF JSON serialisation: {e}"),
    })?;

    let json_padding = (4 - json_bytes.len() % 4) % 4;
    let json_chunk_len = json_bytes.len() + json_padding;
    let bin_padding = (4 - buffer.len() % 4) % 4;
    let bin_chunk_len = buffer.len() + bin_padding;

    let total_len = 12 + 8 + json_chunk_len + 8 + bin_chunk_len;
    let total_u32 = u32::try_from(total_len).map_err(|_| ConvertError::ExportFailed {
        detail: format!("GLB would be {total_len} bytes, over the 4 GiB format limit"),
    })?;

    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_u32.to_le_bytes());

    out.extend_from_slice(&(json_chunk_len as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_bytes);
    out.resize(out.len() + json_padding, b' ');

    out.extend_from_slice(&(bin_chunk_len as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(buffer);
    out.resize(out.len() + bin_padding, 0);

    Ok(out)
}
