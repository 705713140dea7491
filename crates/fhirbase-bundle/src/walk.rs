use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{BundleError, Result};

/// Expands directories to the files they contain.
///
/// Directories are walked recursively, depth-first with entries sorted by
/// file name. Plain files are kept in the given order. A path that does not
/// exist aborts the whole expansion.
pub fn expand_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|source| BundleError::Stat {
            path: path.to_path_buf(),
            source,
        })?;

        if metadata.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_dir() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}
