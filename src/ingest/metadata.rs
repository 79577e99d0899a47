//! Sidecar metadata extraction.
//!
//! A work directory may carry a JSON sidecar describing the work. Selection
//! prefers well-known file names, parsing is permissive, and every field
//! falls back independently: a malformed or missing sidecar never fails the
//! work, it just leaves the derived fields empty.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::utils::natsort::NameCompare;

/// Well-known sidecar names, most specific first, matched case-insensitively.
const PREFERRED_SIDECARS: &[&str] = &[".album.json", "meta.json", "metadata.json", "info.json"];

/// Fields pulled out of a sidecar document. `raw` keeps the whole parsed
/// document for downstream consumers.
#[derive(Debug, Default)]
pub struct WorkMeta {
    pub title: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub raw: Option<Map<String, Value>>,
}

/// Locate, read and parse the best-candidate sidecar among `files`, then
/// extract the descriptive fields from it.
pub fn extract(dir: &Path, files: &[String], compare: NameCompare) -> WorkMeta {
    let Some(name) = pick_sidecar(files, compare) else {
        return WorkMeta::default();
    };

    let Some(raw) = read_sidecar(&dir.join(name)) else {
        return WorkMeta::default();
    };

    let title = get_string(&raw, "title").or_else(|| get_string(&raw, "name"));
    let category = get_string(&raw, "category").or_else(|| get_string(&raw, "type"));
    let tags = extract_tags(&raw);

    WorkMeta {
        title,
        category,
        tags,
        raw: Some(raw),
    }
}

/// Pick the sidecar deterministically: an exact preferred-name match wins,
/// otherwise the natural-sort-smallest remaining `.json` file.
fn pick_sidecar<'a>(files: &'a [String], compare: NameCompare) -> Option<&'a str> {
    let json_files: Vec<&String> = files
        .iter()
        .filter(|name| has_extension(name.as_str(), "json"))
        .collect();

    for candidate in PREFERRED_SIDECARS.iter().copied() {
        if let Some(found) = json_files
            .iter()
            .copied()
            .find(|name| name.eq_ignore_ascii_case(candidate))
        {
            return Some(found.as_str());
        }
    }

    json_files
        .into_iter()
        .min_by(|a, b| compare(a.as_str(), b.as_str()))
        .map(String::as_str)
}

fn has_extension(name: &str, wanted: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

/// Read and parse a sidecar. Unreadable or malformed files log a warning and
/// count as "no metadata"; so do documents whose top level is not an object.
fn read_sidecar(path: &Path) -> Option<Map<String, Value>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to read metadata {:?}: {}", path, e);
            return None;
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse metadata {:?}: {}", path, e);
            None
        }
    }
}

/// A string field, trimmed, only if non-empty after trimming.
fn get_string(doc: &Map<String, Value>, key: &str) -> Option<String> {
    let value = doc.get(key)?.as_str()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Tags come either as a list of strings or one comma-separated string.
/// Non-string list entries are dropped, entries are trimmed, and an empty
/// result collapses to `None`.
fn extract_tags(doc: &Map<String, Value>) -> Option<Vec<String>> {
    let tags: Vec<String> = match doc.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        _ => return None,
    };

    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}
