//! Conversion entry points.
//!
//! [`convert`] does the work and returns the GLB in memory; the other entry
//! points wrap it for files, synchronous callers and in-memory input.

use crate::config::{ConversionConfig, ConversionMode};
use crate::error::{ConvertError, ToolError};
use crate::output::{ConversionOutput, ConversionStats, ModelMetadata, Strategy};
use crate::pipeline::artifact::IntermediateArtifact;
use crate::pipeline::{glb, input, obj, threemf, tool};
use crate::progress::Stage;
use crate::scene::Scene;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a 3MF file to GLB bytes.
///
/// This is the primary entry point for the library.
///
/// In [`ConversionMode::ToolAssisted`] the external CAD tool is tried first;
/// any failure of that step (tool missing, crash, timeout, unusable OBJ) is
/// logged and the 3MF is read directly instead. The returned
/// [`ConversionStats::strategy`] records which path produced the scene.
///
/// # Errors
/// Returns `Err(ConvertError)` only for fatal errors:
/// - File not found / permission denied / not a ZIP
/// - Corrupt or empty 3MF model
/// - GLB encoding failure
pub async fn convert(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let total_start = Instant::now();
    let input_path = input_path.as_ref();
    info!("Starting conversion: {}", input_path.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(input_path);
    }

    // ── Step 1: Resolve input ────────────────────────────────────────────
    stage(config, Stage::ResolveInput);
    let path = input::resolve_input(input_path)?;

    // ── Step 2: Load scene ───────────────────────────────────────────────
    let mut stats = ConversionStats::default();
    let scene = match config.mode {
        ConversionMode::LibraryOnly => {
            stats.strategy = Strategy::LibraryOnly;
            load_3mf(&path, config).await?
        }
        ConversionMode::ToolAssisted => match load_via_tool(&path, config).await {
            Ok((scene, tool_ms)) => {
                stats.strategy = Strategy::ToolAssisted;
                stats.tool_duration_ms = Some(tool_ms);
                scene
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("CAD tool step failed, falling back to built-in 3MF reader: {reason}");
                if let Some(ref cb) = config.progress_callback {
                    cb.on_fallback(&reason);
                }
                stats.strategy = Strategy::Fallback;
                stats.fallback_reason = Some(reason);
                load_3mf(&path, config).await?
            }
        },
    };

    stats.mesh_count = scene.meshes.len();
    stats.vertex_count = scene.vertex_count();
    stats.triangle_count = scene.triangle_count();
    stats.material_count = scene.materials.len();

    // ── Step 3: Export GLB ───────────────────────────────────────────────
    stage(config, Stage::Export);
    let y_up = config.y_up;
    let glb = tokio::task::spawn_blocking(move || glb::export_glb(&scene, y_up))
        .await
        .map_err(|e| ConvertError::Internal(format!("GLB export task failed: {e}")))??;

    stats.glb_bytes = glb.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Conversion complete ({}): {} meshes, {} triangles, {} bytes, {}ms total",
        stats.strategy.as_str(),
        stats.mesh_count,
        stats.triangle_count,
        stats.glb_bytes,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(&stats);
    }

    Ok(ConversionOutput { glb, stats })
}

/// Convert a 3MF file and write the GLB to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// partial output behind.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, ConvertError> {
    let output = convert(input_path, config).await?;
    let path = output_path.as_ref();

    stage(config, Stage::Write);
    let write_failed = |e| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }

    let tmp_path = temp_output_path(path);
    if let Err(e) = tokio::fs::write(&tmp_path, &output.glb).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    debug!("Wrote {} bytes to {}", output.glb.len(), path.display());
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a current-thread tokio runtime internally.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_path, config))
}

/// Read 3MF metadata and counts without converting.
///
/// Never runs the external tool.
pub async fn inspect(input_path: impl AsRef<Path>) -> Result<ModelMetadata, ConvertError> {
    let path = input::resolve_input(input_path.as_ref())?;
    tokio::task::spawn_blocking(move || threemf::inspect_model(&path))
        .await
        .map_err(|e| ConvertError::Internal(format!("inspect task failed: {e}")))?
}

/// Convert 3MF bytes in memory to GLB.
///
/// Internally the library writes `bytes` to a managed [`tempfile`] and cleans
/// it up automatically on return or panic, together with any intermediate
/// files the CAD tool leaves next to it.
///
/// # Example
/// ```rust,no_run
/// use threemf_glb::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("part.3mf")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes(&bytes, &config).await?;
/// std::fs::write("part.glb", &output.glb)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("threemf-glb-")
        .suffix(".3mf")
        .tempfile()
        .map_err(|e| ConvertError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(|e| ConvertError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when `convert` returns
    convert(tmp.path(), config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn stage(config: &ConversionConfig, stage: Stage) {
    debug!("Stage: {stage}");
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

/// Sibling of `output` used for the atomic write.
fn temp_output_path(output: &Path) -> PathBuf {
    let mut os = output.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Read the 3MF directly.
async fn load_3mf(path: &Path, config: &ConversionConfig) -> Result<Scene, ConvertError> {
    stage(config, Stage::Load3mf);
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || threemf::load_scene(&path))
        .await
        .map_err(|e| ConvertError::Internal(format!("3MF loader task failed: {e}")))?
}

/// Run the CAD tool and load its OBJ. Returns the scene and tool run time.
///
/// The intermediate files are removed before this returns, whatever the
/// outcome.
async fn load_via_tool(path: &Path, config: &ConversionConfig) -> Result<(Scene, u64), ToolError> {
    let tool_path = openscad_locate::locate(config.tool.as_deref())?;
    debug!("Using CAD tool at {}", tool_path.display());

    let artifact = IntermediateArtifact::for_input(path);
    // A stale OBJ from an earlier crash would mask a tool that writes nothing.
    artifact.cleanup();

    stage(config, Stage::RunTool);
    let run = tool::run_tool(
        &tool_path,
        path,
        artifact.obj_path(),
        config.tool_timeout_secs,
    )
    .await?;
    if !run.stderr.is_empty() {
        debug!("CAD tool stderr: {}", run.stderr);
    }

    stage(config, Stage::LoadIntermediate);
    let obj_path = artifact.obj_path().to_path_buf();
    let scene = tokio::task::spawn_blocking(move || obj::load_obj(&obj_path))
        .await
        .map_err(|e| ToolError::IntermediateUnreadable {
            path: artifact.obj_path().to_path_buf(),
            detail: format!("loader task failed: {e}"),
        })??;

    artifact.cleanup();
    Ok((scene, run.duration_ms))
}
