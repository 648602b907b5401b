//! Progress-callback trait for conversion stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the converter moves through its stages. The CLI uses this to
//! drive a spinner; library users can forward the events to a log, a job
//! record, or a channel.
//!
//! # Example
//!
//! ```rust
//! use threemf_glb::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     stages: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for StageCounter {
//!     fn on_stage(&self, stage: Stage) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let counter = Arc::new(StageCounter { stages: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionStats;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A step of the conversion pipeline, in the order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Validating the input path.
    ResolveInput,
    /// Waiting on the external CAD tool.
    RunTool,
    /// Reading the tool's OBJ/MTL output.
    LoadIntermediate,
    /// Reading the 3MF package directly.
    Load3mf,
    /// Building the GLB bytes.
    Export,
    /// Writing the output file.
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::ResolveInput => "Checking input",
            Stage::RunTool => "Running CAD tool",
            Stage::LoadIntermediate => "Loading intermediate mesh",
            Stage::Load3mf => "Reading 3MF",
            Stage::Export => "Encoding GLB",
            Stage::Write => "Writing output",
        };
        f.write_str(label)
    }
}

/// Called by the converter as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` so a config
/// can be shared across tasks.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any work is done.
    fn on_conversion_start(&self, input: &Path) {
        let _ = input;
    }

    /// Called when a stage begins.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when the CAD tool step failed and the built-in reader takes over.
    ///
    /// # Arguments
    /// * `reason` — human-readable description of the tool failure
    fn on_fallback(&self, reason: &str) {
        let _ = reason;
    }

    /// Called once after the GLB has been produced.
    fn on_conversion_complete(&self, stats: &ConversionStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
        fallbacks: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_fallback(&self, reason: &str) {
            self.fallbacks.lock().unwrap().push(reason.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(Path::new("cube.3mf"));
        cb.on_stage(Stage::RunTool);
        cb.on_fallback("tool missing");
        cb.on_conversion_complete(&ConversionStats::default());
    }

    #[test]
    fn recorder_receives_events_in_order() {
        let rec = Recorder::default();
        rec.on_stage(Stage::RunTool);
        rec.on_fallback("exit status: 1");
        rec.on_stage(Stage::Load3mf);

        assert_eq!(
            *rec.stages.lock().unwrap(),
            vec![Stage::RunTool, Stage::Load3mf]
        );
        assert_eq!(*rec.fallbacks.lock().unwrap(), vec!["exit status: 1"]);
    }

    #[test]
    fn stage_labels_are_human_readable() {
        assert_eq!(Stage::RunTool.to_string(), "Running CAD tool");
        assert_eq!(Stage::Export.to_string(), "Encoding GLB");
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage(Stage::Write);
    }
}
