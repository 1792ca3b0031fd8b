//! End-of-run cleanup: empty directory purge and partial file detection.
//!
//! These run after the dispatcher returns, including after cancellation.
//! Symlinks are never followed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::download::{RunSummary, is_partial_path};

/// Result of [`finalize_run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Directories removed because they held no files.
    pub removed_directories: usize,
    /// Leftover `.part` files.
    pub partial_files: Vec<PathBuf>,
}

/// Removes every directory under `root` that contains no files, deepest
/// first. A directory whose only children are empty directories is removed
/// too. `root` itself is never removed. A missing `root` is not an error.
///
/// Returns the number of directories removed.
///
/// # Errors
///
/// Returns the first IO error hit while listing or removing a directory.
#[instrument(fields(root = %root.display()))]
pub fn purge_empty_directories(root: &Path) -> io::Result<usize> {
    if !root.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    purge_children(root, &mut removed)?;
    debug!(removed, "empty directories purged");
    Ok(removed)
}

/// Purges empty subdirectories of `dir`; returns true if `dir` is now empty.
fn purge_children(dir: &Path, removed: &mut usize) -> io::Result<bool> {
    let mut is_empty = true;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let child = entry.path();
            if purge_children(&child, removed)? {
                fs::remove_dir(&child)?;
                *removed += 1;
            } else {
                is_empty = false;
            }
        } else {
            is_empty = false;
        }
    }
    Ok(is_empty)
}

/// Lists every file under `root` carrying the partial marker.
///
/// # Errors
///
/// Returns the first IO error hit while listing a directory.
#[instrument(fields(root = %root.display()))]
pub fn find_partials(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut partials = Vec::new();
    if root.is_dir() {
        collect_partials(root, &mut partials)?;
    }
    partials.sort();
    Ok(partials)
}

fn collect_partials(dir: &Path, partials: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_partials(&path, partials)?;
        } else if file_type.is_file() && is_partial_path(&path) {
            partials.push(path);
        }
    }
    Ok(())
}

/// Returns true if any partial file remains under `root`.
///
/// # Errors
///
/// Returns the first IO error hit while listing a directory.
pub fn detect_partials(root: &Path) -> io::Result<bool> {
    Ok(!find_partials(root)?.is_empty())
}

/// Purges empty directories, detects partial files, and stores the partial
/// flag in `summary`.
///
/// # Errors
///
/// Returns the first IO error from either pass.
#[instrument(skip(summary), fields(root = %root.display()))]
pub fn finalize_run(root: &Path, summary: &mut RunSummary) -> io::Result<FinalizeReport> {
    let removed_directories = purge_empty_directories(root)?;
    let partial_files = find_partials(root)?;
    summary.set_partial_files_remain(!partial_files.is_empty());

    if partial_files.is_empty() {
        info!(removed_directories, "run finalized");
    } else {
        warn!(
            removed_directories,
            partial_files = partial_files.len(),
            "run finalized with partial downloads remaining"
        );
    }

    Ok(FinalizeReport {
        removed_directories,
        partial_files,
    })
}
