//! Deterministic output locations

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::ExportFormat;

/// Compute `<dir>/<stem>.<ext>` for `format`, creating `dir` if needed and
/// deleting any file already at that path.
pub fn resolve_output_location(dir: &Path, stem: &str, format: ExportFormat) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::OutputLocation(format!("cannot create {}: {}", dir.display(), e))
    })?;

    let path = dir.join(format!("{}.{}", stem, format.extension()));
    remove_existing(&path)?;

    debug!("Resolved output location for {}: {:?}", format, path);
    Ok(path)
}

/// Remove a file if present. A missing file is not an error.
pub fn remove_existing(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed existing file {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::OutputLocation(format!(
            "cannot remove {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_is_deterministic_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();

        let first = resolve_output_location(dir.path(), "exported", ExportFormat::Caf).unwrap();
        std::fs::write(&first, b"stale").unwrap();

        let second = resolve_output_location(dir.path(), "exported", ExportFormat::Caf).unwrap();
        assert_eq!(first, second);
        assert!(!second.exists());
        assert_eq!(second.extension().unwrap(), "caf");
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let path = resolve_output_location(&nested, "x", ExportFormat::LinearPcm).unwrap();
        assert!(nested.is_dir());
        assert_eq!(path, nested.join("x.wav"));
    }

    #[test]
    fn test_directory_in_the_way_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("exported.wav")).unwrap();

        let err = resolve_output_location(dir.path(), "exported", ExportFormat::LinearPcm)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::OutputLocation);
    }
}
