//! In-memory mesh/material graph shared by both loaders and the exporter.
//!
//! Loaders produce a [`Scene`]; [`crate::pipeline::glb`] consumes it exactly
//! once. Positions are stored as plain `[f32; 3]` so the exporter can cast
//! them straight into the GLB binary chunk.

use serde::{Deserialize, Serialize};

/// Base colour used when a loader has no colour for a surface.
pub const DEFAULT_BASE_COLOR: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

/// A flat list of meshes plus the materials they reference.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub meshes: Vec<SceneMesh>,
    pub materials: Vec<Material>,
}

/// One triangle mesh with at most one material.
#[derive(Debug, Clone, Default)]
pub struct SceneMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals; empty when the source had none.
    pub normals: Vec<[f32; 3]>,
    /// Triangle list, three indices per face.
    pub indices: Vec<u32>,
    /// Index into [`Scene::materials`].
    pub material: Option<usize>,
}

/// A PBR material reduced to what 3MF and MTL can express.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Linear RGBA.
    pub base_color: [f32; 4],
}

impl Material {
    pub fn new(name: impl Into<String>, base_color: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            base_color,
        }
    }
}

impl SceneMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    /// Axis-aligned bounds, or `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        let bounds = self
            .positions
            .iter()
            .skip(1)
            .fold((first, first), |(mut min, mut max), p| {
                for i in 0..3 {
                    min[i] = min[i].min(p[i]);
                    max[i] = max[i].max(p[i]);
                }
                (min, max)
            });
        Some(bounds)
    }
}

impl Scene {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(SceneMesh::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(SceneMesh::triangle_count).sum()
    }

    /// `true` when there is nothing worth exporting.
    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(|m| m.indices.is_empty())
    }

    /// Drop meshes that carry no triangles.
    pub fn prune_empty(&mut self) {
        self.meshes.retain(|m| !m.indices.is_empty());
    }
}

/// Convert an sRGB channel in `0.0..=1.0` to linear light.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linearise an sRGB colour; alpha passes through unchanged.
pub fn linear_rgba(srgb: [f32; 3], alpha: f32) -> [f32; 4] {
    [
        srgb_to_linear(srgb[0]),
        srgb_to_linear(srgb[1]),
        srgb_to_linear(srgb[2]),
        alpha.clamp(0.0, 1.0),
    ]
}
