//! Pipeline stages for 3MF-to-GLB conversion.
//!
//! Each submodule implements one step. The two loaders ([`obj`] and
//! [`threemf`]) produce the same [`crate::scene::Scene`], so the exporter
//! never knows which strategy ran.
//!
//! ## Data Flow
//!
//! ```text
//!                    ┌─▶ tool ──▶ obj ──┐
//! input ──▶ (mode) ──┤      (on failure)├──▶ glb ──▶ write
//!                    └─▶ threemf ◀──────┘
//! ```
//!
//! 1. [`input`]    — check the path exists, is readable and is a ZIP
//! 2. [`tool`]     — run the external CAD tool under a timeout
//! 3. [`artifact`] — own the tool's `.temp.obj` / `.temp.mtl` and delete them
//! 4. [`obj`]      — load the tool's OBJ/MTL with `tobj`
//! 5. [`threemf`]  — read the 3MF package directly (fallback and library-only)
//! 6. [`glb`]      — encode the scene as binary glTF

pub mod artifact;
pub mod glb;
pub mod input;
pub mod obj;
pub mod threemf;
pub mod tool;
