//! All-or-nothing file replacement

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;

/// Replace `path` with `contents` via a sibling temp file and a rename.
///
/// The target is either left untouched or fully replaced. Existing
/// permissions are carried over to the new file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
