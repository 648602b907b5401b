//! Configuration types for 3MF-to-GLB conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The defaults reproduce the stock
//! command: try OpenSCAD for 30 seconds, fall back to the built-in 3MF
//! reader, keep the model's Z-up axes.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default bound on the external tool's run time.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Upper bound accepted by the builder for the tool timeout.
pub const MAX_TOOL_TIMEOUT_SECS: u64 = 3600;

/// Configuration for a 3MF-to-GLB conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use threemf_glb::{ConversionConfig, ConversionMode};
///
/// let config = ConversionConfig::builder()
///     .mode(ConversionMode::ToolAssisted)
///     .tool_timeout_secs(10)
///     .y_up(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Which strategy to attempt first. Default: [`ConversionMode::ToolAssisted`].
    pub mode: ConversionMode,

    /// Explicit CAD tool: a path, or a bare command name looked up on `PATH`.
    /// If None, `openscad` is located automatically.
    pub tool: Option<PathBuf>,

    /// Seconds the CAD tool may run before it is killed and the converter
    /// falls back. Range: 1–3600. Default: 30.
    pub tool_timeout_secs: u64,

    /// Re-orient the Z-up 3MF coordinate frame to glTF's Y-up. Default: false.
    ///
    /// Applied as a rotation on a single root node; vertex data is untouched.
    pub y_up: bool,

    /// Optional progress sink for stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: ConversionMode::default(),
            tool: None,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            y_up: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mode", &self.mode)
            .field("tool", &self.tool)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("y_up", &self.y_up)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn mode(mut self, mode: ConversionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.config.tool = Some(tool.into());
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn y_up(mut self, v: bool) -> Self {
        self.config.y_up = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.tool_timeout_secs == 0 || c.tool_timeout_secs > MAX_TOOL_TIMEOUT_SECS {
            return Err(ConvertError::InvalidConfig(format!(
                "Tool timeout must be 1–{MAX_TOOL_TIMEOUT_SECS} seconds, got {}",
                c.tool_timeout_secs
            )));
        }
        if let Some(ref tool) = c.tool {
            if tool.as_os_str().is_empty() {
                return Err(ConvertError::InvalidConfig(
                    "Tool path must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which loading strategy the converter attempts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversionMode {
    /// Run the CAD tool to an OBJ+MTL intermediate, falling back to the
    /// built-in 3MF reader on any tool failure. (default)
    #[default]
    ToolAssisted,
    /// Read the 3MF directly; never spawn a subprocess.
    LibraryOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_command() {
        let c = ConversionConfig::default();
        assert_eq!(c.mode, ConversionMode::ToolAssisted);
        assert_eq!(c.tool_timeout_secs, 30);
        assert!(c.tool.is_none());
        assert!(!c.y_up);
    }

    #[test]
    fn builder_sets_fields() {
        let c = ConversionConfig::builder()
            .mode(ConversionMode::LibraryOnly)
            .tool("/opt/openscad/bin/openscad")
            .tool_timeout_secs(5)
            .y_up(true)
            .build()
            .unwrap();
        assert_eq!(c.mode, ConversionMode::LibraryOnly);
        assert_eq!(c.tool.as_deref(), Some(std::path::Path::new("/opt/openscad/bin/openscad")));
        assert_eq!(c.tool_timeout_secs, 5);
        assert!(c.y_up);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ConversionConfig::builder()
            .tool_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn oversized_timeout_rejected() {
        assert!(ConversionConfig::builder()
            .tool_timeout_secs(MAX_TOOL_TIMEOUT_SECS + 1)
            .build()
            .is_err());
    }

    #[test]
    fn empty_tool_rejected() {
        assert!(ConversionConfig::builder().tool("").build().is_err());
    }

    #[test]
    fn debug_elides_callback() {
        let out = format!("{:?}", ConversionConfig::default());
        assert!(out.contains("tool_timeout_secs: 30"), "got: {out}");
        assert!(out.contains("progress_callback: None"), "got: {out}");
    }
}
