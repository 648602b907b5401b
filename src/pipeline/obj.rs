//! Loader for the CAD tool's intermediate OBJ/MTL pair.
//!
//! Uses `tobj` with triangulation and single-index output, so every model
//! maps directly onto one [`SceneMesh`]. MTL diffuse colours (`Kd`) are sRGB
//! and get linearised here; dissolve (`d`) becomes alpha.

use crate::error::ToolError;
use crate::scene::{linear_rgba, Material, Scene, SceneMesh, DEFAULT_BASE_COLOR};
use std::path::Path;
use tracing::{debug, info, warn};

/// Load an OBJ (and whatever MTL it references) into a [`Scene`].
///
/// Any failure, including an OBJ with no faces, is a [`ToolError`]: the tool
/// produced something unusable and the caller should fall back.
pub fn load_obj(path: &Path) -> Result<Scene, ToolError> {
    let unusable = |detail: String| ToolError::IntermediateUnreadable {
        path: path.to_path_buf(),
        detail,
    };

    let load_options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };

    let (models, materials) =
        tobj::load_obj(path, &load_options).map_err(|e| unusable(e.to_string()))?;

    // A missing or broken MTL costs us colour, not geometry.
    let materials = materials.unwrap_or_else(|e| {
        warn!("Ignoring materials for {}: {e}", path.display());
        Vec::new()
    });

    let mut scene = Scene {
        meshes: Vec::with_capacity(models.len()),
        materials: materials.iter().map(convert_material).collect(),
    };

    for (i, model) in models.into_iter().enumerate() {
        let mesh = model.mesh;
        let name = if model.name.is_empty() {
            format!("mesh_{i}")
        } else {
            model.name
        };

        let material = mesh.material_id.filter(|&id| {
            let known = id < scene.materials.len();
            if !known {
                warn!("Mesh '{name}' references unknown material {id}");
            }
            known
        });

        let positions: Vec<[f32; 3]> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        let normals: Vec<[f32; 3]> = if mesh.normals.len() == mesh.positions.len() {
            mesh.normals
                .chunks_exact(3)
                .map(|n| [n[0], n[1], n[2]])
                .collect()
        } else {
            Vec::new()
        };

        if let Some(&bad) = mesh.indices.iter().find(|&&ix| ix as usize >= positions.len()) {
            return Err(unusable(format!(
                "mesh '{name}' index {bad} exceeds {} vertices",
                positions.len()
            )));
        }

        debug!(
            "OBJ mesh '{name}': {} vertices, {} triangles, material {:?}",
            positions.len(),
            mesh.indices.len() / 3,
            material
        );

        scene.meshes.push(SceneMesh {
            name,
            positions,
            normals,
            indices: mesh.indices,
            material,
        });
    }

    scene.prune_empty();
    if scene.is_empty() {
        return Err(unusable("no triangles".into()));
    }

    info!(
        "OBJ loaded: {} meshes, {} vertices, {} triangles, {} materials",
        scene.meshes.len(),
        scene.vertex_count(),
        scene.triangle_count(),
        scene.materials.len()
    );
    Ok(scene)
}

fn convert_material(m: &tobj::Material) -> Material {
    let alpha = m.dissolve.unwrap_or(1.0);
    let base_color = match m.diffuse {
        Some(kd) => linear_rgba(kd, alpha),
        None => {
            let [r, g, b, _] = DEFAULT_BASE_COLOR;
            [r, g, b, alpha.clamp(0.0, 1.0)]
        }
    };
    Material::new(m.name.clone(), base_color)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRA: &str = "mtllib tetra.mtl\n\
        o tetra\n\
        v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\n\
        usemtl blue\n\
        f 1 3 2\nf 1 2 4\nf 1 4 3\nf 2 3 4\n";

    const MTL: &str = "newmtl blue\nKd 0.0 0.0 1.0\nd 0.5\n";

    fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_geometry_and_material() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tetra.mtl", MTL);
        let obj = write(dir.path(), "tetra.obj", TETRA);

        let scene = load_obj(&obj).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.vertex_count(), 4);
        assert_eq!(scene.triangle_count(), 4);
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].name, "blue");
        assert_eq!(scene.materials[0].base_color, [0.0, 0.0, 1.0, 0.5]);
        assert_eq!(scene.meshes[0].material, Some(0));
    }

    #[test]
    fn missing_mtl_keeps_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let obj = write(dir.path(), "tetra.obj", TETRA);

        let scene = load_obj(&obj).unwrap();
        assert_eq!(scene.triangle_count(), 4);
        assert!(scene.materials.is_empty());
        assert_eq!(scene.meshes[0].material, None);
    }

    #[test]
    fn quads_are_triangulated() {
        let dir = tempfile::tempdir().unwrap();
        let obj = write(
            dir.path(),
            "quad.obj",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        );
        assert_eq!(load_obj(&obj).unwrap().triangle_count(), 2);
    }

    #[test]
    fn faceless_obj_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let obj = write(dir.path(), "points.obj", "v 0 0 0\nv 1 0 0\n");
        assert!(matches!(
            load_obj(&obj).unwrap_err(),
            ToolError::IntermediateUnreadable { .. }
        ));
    }

    #[test]
    fn missing_obj_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_obj(&dir.path().join("absent.obj")).unwrap_err(),
            ToolError::IntermediateUnreadable { .. }
        ));
    }

    #[test]
    fn material_without_diffuse_uses_default_grey() {
        let m = tobj::Material {
            name: "plain".into(),
            ..Default::default()
        };
        assert_eq!(convert_material(&m).base_color, DEFAULT_BASE_COLOR);
    }
}
