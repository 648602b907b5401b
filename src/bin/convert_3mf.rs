//! CLI binary for threemf-glb.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use threemf_glb::{
    convert_to_file, inspect, ConversionConfig, ConversionMode, ConversionProgressCallback,
    ConversionStats, ModelMetadata, ProgressCallback, Stage, Strategy,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: convert_3mf <input.3mf> <output.glb>";

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner on stderr whose message follows the
/// pipeline stage, with a log line when the tool step is abandoned.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, input: &Path) {
        self.bar.set_message(input.display().to_string());
    }

    fn on_stage(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_fallback(&self, reason: &str) {
        // Keep long tool diagnostics to one terminal line.
        let line = reason.lines().next().unwrap_or_default();
        let msg = if line.chars().count() > 100 {
            format!("{}\u{2026}", line.chars().take(99).collect::<String>())
        } else {
            line.to_string()
        };
        self.bar.println(format!(
            "  {} CAD tool unavailable, using built-in reader: {}",
            yellow("⚠"),
            dim(&msg)
        ));
    }

    fn on_conversion_complete(&self, stats: &ConversionStats) {
        self.bar.println(format!(
            "  {} {} meshes, {} triangles, {} materials  {}",
            green("✓"),
            stats.mesh_count,
            stats.triangle_count,
            stats.material_count,
            dim(&format!("via {}", stats.strategy.as_str())),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert, trying OpenSCAD first and falling back to the built-in reader
  convert_3mf part.3mf part.glb

  # Skip the CAD tool entirely
  convert_3mf --library-only part.3mf part.glb

  # Use a specific OpenSCAD build with a longer timeout
  convert_3mf --tool /opt/openscad/bin/openscad --timeout 120 part.3mf part.glb

  # Re-orient for viewers that expect +Y up
  convert_3mf --y-up part.3mf part.glb

  # Inspect 3MF metadata (no conversion, no CAD tool)
  convert_3mf --inspect-only part.3mf
  convert_3mf --inspect-only --json part.3mf

ENVIRONMENT VARIABLES:
  RUST_LOG   Log filter for stderr diagnostics (e.g. RUST_LOG=threemf_glb=debug)

EXIT STATUS:
  0  GLB written (with or without the CAD tool)
  1  Missing arguments, unreadable or corrupt input, or output write failure
"#;

/// Convert 3MF models to binary glTF (GLB).
#[derive(Parser, Debug)]
#[command(
    name = "convert_3mf",
    version,
    about = "Convert 3MF models to binary glTF (GLB)",
    long_about = "Convert a 3MF model to GLB. OpenSCAD is tried first for the best colour \
fidelity; if it is missing, fails or times out, the model is read directly.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// 3MF file to convert.
    input: Option<PathBuf>,

    /// GLB file to write.
    output: Option<PathBuf>,

    /// Never run the CAD tool; read the 3MF directly.
    #[arg(long)]
    library_only: bool,

    /// CAD tool executable (path or command name). Default: openscad.
    #[arg(long, value_name = "PATH")]
    tool: Option<PathBuf>,

    /// Seconds the CAD tool may run before falling back (1–3600).
    #[arg(long, value_name = "SECS", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..=3600))]
    timeout: u64,

    /// Rotate the scene so +Y is up (3MF is +Z up).
    #[arg(long)]
    y_up: bool,

    /// Print 3MF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print JSON (stats or metadata) instead of text.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the result line.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; it
    // provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let Some(input) = cli.input.clone() else {
        println!("{USAGE}");
        std::process::exit(1);
    };

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&input).await.context("Failed to inspect 3MF")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            print_metadata(&input, &meta);
        }
        return Ok(());
    }

    let Some(output) = cli.output.clone() else {
        println!("{USAGE}");
        std::process::exit(1);
    };

    // ── Build config ─────────────────────────────────────────────────────
    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|cb| cb as Arc<dyn ConversionProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let result = convert_to_file(&input, &output, &config).await;
    if let Some(ref s) = spinner {
        s.finish();
    }
    let stats = result.with_context(|| format!("Failed to convert {}", input.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
        return Ok(());
    }

    println!(
        "Successfully converted {} to {}",
        input.display(),
        output.display()
    );

    if !cli.quiet {
        if stats.strategy == Strategy::Fallback && !show_progress {
            // The spinner already reported the fallback.
            if let Some(ref reason) = stats.fallback_reason {
                eprintln!("  {} {}", yellow("⚠"), dim(reason));
            }
        }
        eprintln!(
            "{}  {} meshes  {} triangles  {} bytes  {}ms  →  {}",
            green("✔"),
            stats.mesh_count,
            stats.triangle_count,
            stats.glb_bytes,
            stats.total_duration_ms,
            bold(&output.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mode = if cli.library_only {
        ConversionMode::LibraryOnly
    } else {
        ConversionMode::ToolAssisted
    };

    let mut builder = ConversionConfig::builder()
        .mode(mode)
        .tool_timeout_secs(cli.timeout)
        .y_up(cli.y_up);

    if let Some(ref tool) = cli.tool {
        builder = builder.tool(tool.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_metadata(input: &Path, meta: &ModelMetadata) {
    println!("File:         {}", input.display());
    if let Some(t) = meta.title() {
        println!("Title:        {}", t);
    }
    if let Some(d) = meta.designer() {
        println!("Designer:     {}", d);
    }
    for (key, value) in &meta.metadata {
        if key != "Title" && key != "Designer" {
            println!("{:<13} {}", format!("{key}:"), value);
        }
    }
    println!("Unit:         {}", meta.unit);
    println!("Objects:      {}", meta.object_count);
    println!("Build items:  {}", meta.build_item_count);
    println!("Vertices:     {}", meta.vertex_count);
    println!("Triangles:    {}", meta.triangle_count);
    println!(
        "Materials:    {} base groups, {} colour groups",
        meta.base_material_count, meta.color_group_count
    );
    for m in &meta.materials {
        let [r, g, b, a] = m.base_color;
        println!(
            "  - {:<20} linear rgba({:.3}, {:.3}, {:.3}, {:.3})",
            m.name, r, g, b, a
        );
    }
}
