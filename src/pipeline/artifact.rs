//! The CAD tool's intermediate OBJ/MTL pair and its cleanup guard.
//!
//! The tool writes next to the input (`cube.3mf.temp.obj`, with
//! `cube.3mf.temp.mtl` beside it), so the paths cannot come from `tempfile`.
//! [`IntermediateArtifact`] owns both paths and deletes them when dropped,
//! which covers early returns, `?` propagation and panics alike.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix appended to the input path for the tool's OBJ output.
pub const OBJ_SUFFIX: &str = ".temp.obj";
/// Suffix appended to the input path for the OBJ's material sidecar.
pub const MTL_SUFFIX: &str = ".temp.mtl";

/// Temporary mesh + material files owned by a single conversion.
#[derive(Debug)]
pub struct IntermediateArtifact {
    obj_path: PathBuf,
    mtl_path: PathBuf,
}

impl IntermediateArtifact {
    /// Derive the artifact paths for `input` without touching the filesystem.
    pub fn for_input(input: &Path) -> Self {
        Self {
            obj_path: with_suffix(input, OBJ_SUFFIX),
            mtl_path: with_suffix(input, MTL_SUFFIX),
        }
    }

    pub fn obj_path(&self) -> &Path {
        &self.obj_path
    }

    pub fn mtl_path(&self) -> &Path {
        &self.mtl_path
    }

    /// Remove both files. Missing files are not an error.
    pub fn cleanup(&self) {
        for path in [&self.obj_path, &self.mtl_path] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed intermediate file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {e}", path.display()),
            }
        }
    }
}

impl Drop for IntermediateArtifact {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}
