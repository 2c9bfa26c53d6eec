//! File discovery.
//!
//! Walks a root path with the standard ignore filters (gitignore, hidden
//! files) and returns a deterministic, sorted list of candidate files
//! matching the wanted extensions.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::{Error, Result};

/// Discover candidate files under `root`, ordered by path.
///
/// A root that is itself a file yields just that file; combining a file root
/// with recursion is a configuration error.
pub fn discover_files(root: &Path, recurse: bool, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        if recurse {
            return Err(Error::Config(
                "cannot recurse when a single file is specified".into(),
            ));
        }
        return Ok(vec![root.to_path_buf()]);
    }

    let mut builder = WalkBuilder::new(root);
    if !recurse {
        builder.max_depth(Some(1));
    }
    builder.sort_by_file_path(|a, b| a.cmp(b));

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!("skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.into_path();
        if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.contains(&ext))
        {
            files.push(path);
        }
    }
    Ok(files)
}
