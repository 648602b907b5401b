//! # threemf-glb
//!
//! Convert 3MF (3D Manufacturing Format) models to GLB (binary glTF 2.0).
//!
//! ## Why this crate?
//!
//! Slicers and CAD tools emit 3MF, while web viewers, game engines and AR
//! previews want glTF. An external CAD tool (OpenSCAD by default) usually
//! produces the best colour fidelity, but it is not always installed and it
//! does not always finish. This crate tries the tool under a timeout and
//! falls back to its own 3MF reader, so a conversion only fails when the
//! input itself is unusable.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input.3mf
//!  │
//!  ├─ 1. Input    validate path, readability, ZIP magic
//!  ├─ 2. Tool     openscad -o input.3mf.temp.obj input.3mf  (timeout, kill on expiry)
//!  ├─ 3. Load     OBJ + MTL → Scene, or on any tool failure 3MF → Scene
//!  ├─ 4. Export   Scene → GLB (gltf-json + binary chunk, spawn_blocking)
//!  ├─ 5. Write    temp file + rename
//!  └─ 6. Cleanup  .temp.obj / .temp.mtl removed on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use threemf_glb::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let stats = convert_to_file("part.3mf", "part.glb", &config).await?;
//!     eprintln!("{} triangles via {}", stats.triangle_count, stats.strategy.as_str());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convert_3mf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! threemf-glb = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scene;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ConversionMode};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file, inspect};
pub use error::{ConvertError, ToolError};
pub use output::{ConversionOutput, ConversionStats, ModelMetadata, Strategy};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use scene::{Material, Scene, SceneMesh};
