//! Input resolution: validate the user-supplied 3MF path before any work.
//!
//! A 3MF package is an OPC ZIP container, so we check the local-file-header
//! magic (`PK\x03\x04`) up front. Callers get a precise error instead of a
//! ZIP or tool failure further down the pipeline.

use crate::error::ConvertError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Local file header signature that opens every ZIP archive.
pub const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Resolve a local 3MF path, validating existence, readability and magic bytes.
pub fn resolve_input(path: &Path) -> Result<PathBuf, ConvertError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(ConvertError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => return Err(ConvertError::FileNotFound { path }),
    };

    // Short files leave the tail zeroed and fail the comparison below.
    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ConvertError::Internal(format!(
                    "Failed to read '{}': {e}",
                    path.display()
                )))
            }
        }
    }

    if magic != ZIP_MAGIC {
        return Err(ConvertError::NotA3mf { path, magic });
    }

    debug!("Resolved local 3MF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(&dir.path().join("absent.3mf")).unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path()).unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound { .. }));
    }

    #[test]
    fn non_zip_is_rejected_with_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.3mf");
        std::fs::write(&path, b"solid cube\nendsolid cube\n").unwrap();

        match resolve_input(&path).unwrap_err() {
            ConvertError::NotA3mf { magic, .. } => assert_eq!(&magic, b"soli"),
            other => panic!("expected NotA3mf, got {other:?}"),
        }
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.3mf");
        std::fs::write(&path, b"").unwrap();

        match resolve_input(&path).unwrap_err() {
            ConvertError::NotA3mf { magic, .. } => assert_eq!(magic, [0; 4]),
            other => panic!("expected NotA3mf, got {other:?}"),
        }
    }

    #[test]
    fn zip_magic_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.3mf");
        std::fs::write(&path, b"PK\x03\x04rest-of-archive").unwrap();

        assert_eq!(resolve_input(&path).unwrap(), path);
    }
}
