//! # openscad-locate
//!
//! Find an installed [OpenSCAD](https://openscad.org/) executable so callers
//! can shell out to it without asking the user where it lives.
//!
//! ## How it works
//!
//! [`locate`] resolves, in order:
//!
//! 1. An explicit path supplied by the caller (must point at a file).
//! 2. An explicit bare command name, looked up on `PATH`.
//! 3. `openscad` on `PATH`.
//! 4. The platform's usual install locations (see table below).
//!
//! The result of the default lookup is cached for the lifetime of the
//! process, so repeated conversions only pay for the `PATH` scan once.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use openscad_locate::locate;
//!
//! match locate(None) {
//!     Ok(path) => println!("OpenSCAD at {}", path.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! ## Platform install locations
//!
//! | OS      | Candidates |
//! |---------|------------|
//! | macOS   | `/Applications/OpenSCAD.app/Contents/MacOS/OpenSCAD`, `~/Applications/OpenSCAD.app/…`, Homebrew `bin` dirs |
//! | Linux   | `/usr/bin`, `/usr/local/bin`, `/snap/bin`, `/var/lib/flatpak/exports/bin/org.openscad.OpenSCAD` |
//! | Windows | `%ProgramFiles%\OpenSCAD\openscad.exe`, `%ProgramFiles(x86)%\OpenSCAD\openscad.exe` |

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Command name searched on `PATH` when no explicit tool is given.
pub const DEFAULT_TOOL_NAME: &str = "openscad";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by openscad-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// Nothing matching `name` on `PATH` or in the platform locations.
    #[error("'{name}' was not found on PATH or in {} known install locations", searched.len())]
    NotFound { name: String, searched: Vec<PathBuf> },

    /// An explicit path was given but nothing executable lives there.
    #[error("Tool path '{path}' does not exist or is not a file")]
    NotAFile { path: PathBuf },
}

// ── Platform install locations ───────────────────────────────────────────────

#[cfg(target_os = "macos")]
fn platform_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("/Applications/OpenSCAD.app/Contents/MacOS/OpenSCAD"),
        PathBuf::from("/opt/homebrew/bin/openscad"),
        PathBuf::from("/usr/local/bin/openscad"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.insert(
            1,
            home.join("Applications/OpenSCAD.app/Contents/MacOS/OpenSCAD"),
        );
    }
    candidates
}

#[cfg(target_os = "windows")]
fn platform_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for var in ["ProgramFiles", "ProgramFiles(x86)"] {
        if let Some(dir) = std::env::var_os(var) {
            candidates.push(PathBuf::from(dir).join("OpenSCAD").join("openscad.exe"));
        }
    }
    if let Some(local) = dirs::data_local_dir() {
        candidates.push(local.join("Programs").join("OpenSCAD").join("openscad.exe"));
    }
    candidates
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("/usr/bin/openscad"),
        PathBuf::from("/usr/local/bin/openscad"),
        PathBuf::from("/snap/bin/openscad"),
        PathBuf::from("/var/lib/flatpak/exports/bin/org.openscad.OpenSCAD"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local/bin/openscad"));
    }
    candidates
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static DEFAULT_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve the CAD tool executable.
///
/// `explicit` may be a path (`/opt/openscad/bin/openscad`, `./tools/fake.sh`)
/// or a bare command name (`openscad-nightly`). `None` runs the default
/// lookup for [`DEFAULT_TOOL_NAME`], whose result is cached per process.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, LocateError> {
    match explicit {
        Some(path) if is_bare_name(path) => resolve_bare(&path.to_string_lossy()),
        Some(path) => {
            if path.is_file() {
                Ok(path.to_path_buf())
            } else {
                Err(LocateError::NotAFile {
                    path: path.to_path_buf(),
                })
            }
        }
        None => locate_default(),
    }
}

/// Default lookup for [`DEFAULT_TOOL_NAME`], cached after the first success.
pub fn locate_default() -> Result<PathBuf, LocateError> {
    if let Some(path) = DEFAULT_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve_bare(DEFAULT_TOOL_NAME)?;

    // Racing initialisers resolve the same path; either value is fine.
    let _ = DEFAULT_PATH.set(path.clone());

    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// A single normal path component with no directory part.
fn is_bare_name(path: &Path) -> bool {
    let mut components = path.components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

fn resolve_bare(name: &str) -> Result<PathBuf, LocateError> {
    if let Ok(found) = which::which(name) {
        return Ok(found);
    }

    let candidates = if name == DEFAULT_TOOL_NAME {
        platform_candidates()
    } else {
        Vec::new()
    };

    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| LocateError::NotFound {
            name: name.to_string(),
            searched: candidates,
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
