//! Result types returned by the conversion entry points.

use crate::scene::Material;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The GLB document plus statistics about how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Complete GLB file contents.
    #[serde(skip)]
    pub glb: Vec<u8>,
    pub stats: ConversionStats,
}

/// Which loader produced the exported scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The CAD tool's OBJ/MTL intermediate was used.
    ToolAssisted,
    /// The CAD tool step failed; the 3MF was read directly.
    Fallback,
    /// The 3MF was read directly because tool use was disabled.
    #[default]
    LibraryOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ToolAssisted => "tool-assisted",
            Strategy::Fallback => "fallback",
            Strategy::LibraryOnly => "library-only",
        }
    }
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub strategy: Strategy,
    /// Why the tool step was abandoned, when `strategy == Fallback`.
    pub fallback_reason: Option<String>,
    pub mesh_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub material_count: usize,
    pub glb_bytes: usize,
    /// Wall-clock time spent waiting on the CAD tool, if it ran.
    pub tool_duration_ms: Option<u64>,
    pub total_duration_ms: u64,
}

/// Model-level information read from a 3MF without converting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// The model's `unit` attribute (`millimeter` when absent).
    pub unit: String,
    /// `<metadata name="…">` entries, e.g. `Title`, `Designer`.
    pub metadata: BTreeMap<String, String>,
    pub object_count: usize,
    pub build_item_count: usize,
    /// Vertices and triangles summed over mesh objects (not instances).
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub base_material_count: usize,
    pub color_group_count: usize,
    /// Every colour the model can reference, linearised.
    pub materials: Vec<Material>,
}

impl ModelMetadata {
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("Title").map(String::as_str)
    }

    pub fn designer(&self) -> Option<&str> {
        self.metadata.get("Designer").map(String::as_str)
    }
}
