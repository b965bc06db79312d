//! One-shot vault enumeration for the initial build.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::{is_markdown, IoError, DEFAULT_EXCLUDED_DIRS};

/// User-facing scan knobs.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Extra exclusion globs, matched against the path relative to the
    /// vault root.
    pub excludes: Vec<String>,
}

impl ScanOptions {
    fn build_globset(&self) -> Result<GlobSet, IoError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excludes {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(false)
                .build()
                .map_err(|e| IoError::InvalidExclude {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| IoError::InvalidExclude {
            pattern: String::new(),
            message: e.to_string(),
        })
    }
}

fn excluded_dir(name: &str) -> bool {
    name.starts_with('.') || DEFAULT_EXCLUDED_DIRS.contains(&name)
}

/// Walk the vault and return every Markdown file, sorted by path so the
/// initial build is deterministic.
///
/// Skips hidden files, dot-directories, the default exclusion set, and
/// anything matching a user exclude glob.
pub fn scan_vault(root: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>, IoError> {
    if !root.is_dir() {
        return Err(IoError::InvalidRoot(root.to_path_buf()));
    }
    let excludes = options.build_globset()?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            !excluded_dir(&name)
        } else {
            !name.starts_with('.')
        }
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }
        if !excludes.is_empty() {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if excludes.is_match(relative) {
                continue;
            }
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}
