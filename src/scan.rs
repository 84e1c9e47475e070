//! Folder traversal and task planning.
//!
//! Walks an input directory tree to discover the images a batch run will
//! crop, and maps each one to a destination under the output root that
//! mirrors its relative path:
//!
//! ```text
//! photos/                          photos-cropped/
//! ├── 2023/                        ├── 2023/
//! │   ├── beach.JPG        →       │   ├── beach.JPG
//! │   └── notes.txt                │   └── (not an image, ignored)
//! ├── portrait.jpeg        →       ├── portrait.jpeg
//! └── .thumbs/                     └── (hidden, ignored)
//!     └── x.png
//! ```
//!
//! ## Matching rules
//!
//! - Extensions `jpg`, `jpeg` and `png`, compared case-insensitively.
//! - Hidden entries (name starts with `.`) are skipped, directories included.
//! - Symlinks are followed; every physical file is reported once, deduplicated
//!   by its canonical path, however many names point at it.
//! - When the output root lives inside the input root, that subtree is not
//!   walked, so re-running a batch never crops its own output.
//!
//! Results are sorted by relative path. Callers that only care about the set
//! of files must not rely on the order.

use crate::imaging::supported_input_extensions;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Input directory not found: {0}")]
    InputNotFound(PathBuf),
    #[error("Input path is not a directory: {0}")]
    InputNotDirectory(PathBuf),
    #[error("Output directory must differ from the input directory: {0}")]
    OutputIsInput(PathBuf),
}

/// An image found under the input root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredImage {
    /// Path relative to the input root.
    pub relative_path: PathBuf,
    /// Canonical absolute path.
    pub absolute_path: PathBuf,
}

/// One unit of work for the batch processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub source_path: PathBuf,
    pub relative_path: PathBuf,
    pub destination_path: PathBuf,
}

/// Whether `path` has one of the supported image extensions.
pub fn is_supported_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    supported_input_extensions().contains(&ext.as_str())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Check that `root` exists and is a directory, returning its canonical form.
pub fn validate_input_root(root: &Path) -> Result<PathBuf, ScanError> {
    if !root.exists() {
        return Err(ScanError::InputNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::InputNotDirectory(root.to_path_buf()));
    }
    Ok(fs::canonicalize(root)?)
}

/// Enumerate every supported image under `root`.
pub fn enumerate(root: &Path) -> Result<Vec<DiscoveredImage>, ScanError> {
    enumerate_excluding(root, None)
}

/// Enumerate every supported image under `root`, skipping the `exclude` subtree.
pub fn enumerate_excluding(
    root: &Path,
    exclude: Option<&Path>,
) -> Result<Vec<DiscoveredImage>, ScanError> {
    let root = validate_input_root(root)?;
    let exclude = exclude
        .and_then(|p| fs::canonicalize(p).ok())
        .filter(|p| p.starts_with(&root));

    let walker = WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !is_hidden(e) && exclude.as_deref().is_none_or(|ex| !e.path().starts_with(ex))
        });

    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_supported_image(entry.path()) {
            continue;
        }

        let absolute_path = match fs::canonicalize(entry.path()) {
            Ok(p) => p,
            Err(err) => {
                warn!(path = %entry.path().display(), "skipping unresolvable entry: {}", err);
                continue;
            }
        };
        if !seen.insert(absolute_path.clone()) {
            debug!(path = %entry.path().display(), "duplicate of an already discovered file");
            continue;
        }

        let relative_path = entry
            .path()
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(entry.file_name()));

        images.push(DiscoveredImage {
            relative_path,
            absolute_path,
        });
    }

    images.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!(root = %root.display(), count = images.len(), "enumerated images");
    Ok(images)
}

/// Discover the images under `input_root` and pair each with its mirrored
/// destination under `output_root`.
///
/// `output_root` does not need to exist yet.
pub fn plan_tasks(input_root: &Path, output_root: &Path) -> Result<Vec<ImageTask>, ScanError> {
    let input = validate_input_root(input_root)?;
    let output = resolve_output_root(output_root)?;
    if output == input {
        return Err(ScanError::OutputIsInput(output_root.to_path_buf()));
    }

    let images = enumerate_excluding(&input, Some(&output))?;
    Ok(images
        .into_iter()
        .map(|img| ImageTask {
            destination_path: output_root.join(&img.relative_path),
            source_path: img.absolute_path,
            relative_path: img.relative_path,
        })
        .collect())
}

/// Default output root for `input_root`: `<name>-cropped` in the working directory.
///
/// The name comes from the canonical input path, so `.` and trailing
/// slashes still produce a meaningful name.
pub fn default_output_root(input_root: &Path) -> PathBuf {
    let name = fs::canonicalize(input_root)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .or_else(|| {
            input_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "images".to_string());
    PathBuf::from(format!("{name}-cropped"))
}

/// Canonicalize the output root, or its nearest existing ancestor when it
/// has not been created yet.
fn resolve_output_root(output_root: &Path) -> Result<PathBuf, ScanError> {
    if let Ok(path) = fs::canonicalize(output_root) {
        return Ok(path);
    }
    let absolute = if output_root.is_absolute() {
        output_root.to_path_buf()
    } else {
        std::env::current_dir()?.join(output_root)
    };
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
    let mut resolved = fs::canonicalize(existing)?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}
