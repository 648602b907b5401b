//! Error types for the threemf-glb library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the conversion cannot produce a GLB
//!   (missing or corrupt input, export failure, unwritable output). Returned
//!   as `Err(ConvertError)` from the top-level `convert*` functions.
//!
//! * [`ToolError`] — **Recoverable**: the external CAD tool could not produce
//!   a usable intermediate mesh (not installed, crashed, timed out). The
//!   converter logs it, records it in
//!   [`crate::output::ConversionStats::fallback_reason`], and falls back to
//!   reading the 3MF directly.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the threemf-glb library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("3MF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a ZIP container.
    #[error("File is not a valid 3MF package: '{path}'\nFirst bytes: {magic:?}")]
    NotA3mf { path: PathBuf, magic: [u8; 4] },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The package or its model XML cannot be interpreted.
    #[error("3MF '{path}' is corrupt: {detail}")]
    CorruptModel { path: PathBuf, detail: String },

    /// The model parsed but contains no triangles to export.
    #[error("'{path}' contains no printable geometry")]
    EmptyScene { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The scene could not be serialised as GLB.
    #[error("GLB export failed: {detail}")]
    ExportFailed { detail: String },

    /// Could not create or write the output GLB file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        ConvertError::CorruptModel {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// A recoverable failure of the external CAD tool step.
///
/// Never returned from the public `convert*` functions; the converter turns
/// it into a fallback to the built-in 3MF reader.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool executable could not be located.
    #[error("CAD tool not available: {0}")]
    NotFound(#[from] openscad_locate::LocateError),

    /// The process could not be started.
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool did not finish within the configured timeout.
    #[error("CAD tool timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The tool exited with a non-zero status.
    #[error("CAD tool failed with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// Exit status 0, but the intermediate mesh was never written.
    #[error("CAD tool exited successfully but '{path}' was not created")]
    OutputMissing { path: PathBuf },

    /// The intermediate mesh exists but could not be loaded.
    #[error("Intermediate mesh '{path}' is unusable: {detail}")]
    IntermediateUnreadable { path: PathBuf, detail: String },
}
