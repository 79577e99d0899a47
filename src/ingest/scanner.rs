//! Work-directory discovery and per-directory scanning.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::database::store::WorkRecord;
use crate::ingest::{dates, metadata, pages};
use crate::utils::natsort::NameCompare;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to list root directory {path}")]
    ListRoot {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to list work directory {path}")]
    ListWork {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize metadata for {key}")]
    EncodeMeta {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything scanned from one work directory, ready for a catalog upsert.
#[derive(Debug)]
pub struct WorkEntry {
    pub work: WorkRecord,
    pub pages: Vec<pages::PageEntry>,
}

/// Derive the stable catalog key for `path`: its location relative to `root`
/// joined with `/` regardless of the host separator. Pure and total; a path
/// outside `root` keys as itself.
pub fn work_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// List the immediate, non-hidden subdirectories of `root` in natural order.
/// Failure here is fatal to the pass.
pub fn list_work_dirs(root: &Path, compare: NameCompare) -> Result<Vec<PathBuf>, ScanError> {
    let mut dirs = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| ScanError::ListRoot {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() && !is_hidden(&entry) {
            dirs.push(entry.into_path());
        }
    }

    dirs.sort_by(|a, b| compare(&file_name(a), &file_name(b)));
    Ok(dirs)
}

/// Scan one work directory: metadata, publish date, pages.
pub fn scan_work(root: &Path, dir: &Path, compare: NameCompare) -> Result<WorkEntry, ScanError> {
    let files = list_files(dir)?;
    let key = work_key(root, dir);

    let meta = metadata::extract(dir, &files, compare);
    let published_at = meta.raw.as_ref().and_then(dates::resolve_published_at);

    let tags = meta
        .tags
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|source| ScanError::EncodeMeta {
            key: key.clone(),
            source,
        })?;
    let raw_meta = meta
        .raw
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|source| ScanError::EncodeMeta {
            key: key.clone(),
            source,
        })?;

    let work = WorkRecord {
        title: meta.title.unwrap_or_else(|| key.clone()),
        key,
        category: meta.category,
        tags,
        meta: raw_meta,
        published_at,
    };

    let pages = pages::scan_pages(root, dir, &files, compare);

    Ok(WorkEntry { work, pages })
}

fn list_files(dir: &Path) -> Result<Vec<String>, ScanError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ScanError::ListWork {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScanError::ListWork {
            path: dir.to_path_buf(),
            source,
        })?;
        let is_file = entry
            .file_type()
            .map_err(|source| ScanError::ListWork {
                path: dir.to_path_buf(),
                source,
            })?
            .is_file();
        if is_file {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
