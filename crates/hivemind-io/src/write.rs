//! Atomic file replacement: temp file in the same directory, fsync,
//! rename over the target.

use std::io::Write as _;
use std::path::Path;

use crate::IoError;

/// Write `contents` to `path` without ever exposing a half-written
/// file. Used by the fix workflow and anything else that rewrites vault
/// files in place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), IoError> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let io_err = |e: std::io::Error| IoError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(contents).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| IoError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        std::fs::write(&path, b"old").unwrap();
        write_atomic(&path, b"new contents").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new contents");
    }

    #[test]
    fn creates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.md");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }
}
