//! Whole-file writes that never leave a half-written file behind.
//!
//! The link cache, the metadata sidecar, and every generated page are
//! written to a temporary file in the destination directory and then renamed
//! over the target. Readers see either the old content or the new content.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `contents` to `path` via a sibling temp file and an atomic rename.
///
/// Creates the parent directory if needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
