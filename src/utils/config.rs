use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

/// Resolved invocation settings: where to scan and where the catalog lives.
#[derive(Debug)]
pub struct Settings {
    pub root: PathBuf,
    pub db_path: String,
}

/// Resolve settings from CLI arguments, falling back to process env and an
/// optional `.env` file in the working directory.
///
/// Precedence per value: explicit argument, then process env, then `.env`.
/// The media root has no built-in default; the catalog path defaults to
/// `data.db`.
pub fn resolve(root_arg: Option<PathBuf>, db_arg: Option<String>) -> Result<Settings> {
    let env_file = load_env_file(Path::new(".env"));

    let root = root_arg
        .or_else(|| lookup("MEDIA_ROOT", &env_file).map(PathBuf::from))
        .ok_or_else(|| anyhow!("No media root given: pass --root or set MEDIA_ROOT"))?;

    let db_path = db_arg
        .or_else(|| lookup("DATABASE_URL", &env_file))
        .unwrap_or_else(|| "data.db".to_string());

    Ok(Settings { root, db_path })
}

fn lookup(key: &str, env_file: &HashMap<String, String>) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env_file.get(key).cloned())
}

/// Parse a `KEY=VALUE` env file. A missing or unreadable file is treated as
/// empty; lines without `=` and comment lines are skipped.
fn load_env_file(path: &Path) -> HashMap<String, String> {
    let mut values = HashMap::new();

    let Ok(file) = File::open(path) else {
        return values;
    };

    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        if line.trim_start().starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            if !value.is_empty() {
                values.insert(key.trim().to_string(), value.to_string());
            }
        }
    }

    values
}
