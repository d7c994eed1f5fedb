//! Model version files (`<versions_dir>/<model>.ver`).
//!
//! These are shell fragments of `export name=value` lines maintained by the
//! operational suite. Only plain assignments are understood.

use std::path::{Path, PathBuf};

use crate::error::JobError;

/// Assignments read from one version file, in file order.
#[derive(Debug, Clone)]
pub struct VersionFile {
    pub model: String,
    pub path: PathBuf,
    pub assignments: Vec<(String, String)>,
}

impl VersionFile {
    pub fn load(versions_dir: &Path, model: &str) -> Result<Self, JobError> {
        let path = versions_dir.join(format!("{model}.ver"));
        let text = std::fs::read_to_string(&path).map_err(|source| JobError::VersionFile {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            model: model.to_string(),
            path,
            assignments: parse_assignments(&text),
        })
    }

    /// Name of the variable holding this model's version, e.g. `gfs_ver`.
    pub fn version_key(&self) -> String {
        format!("{}_ver", self.model)
    }
}

pub fn parse_assignments(text: &str) -> Vec<(String, String)> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
    let (key, raw) = line.split_once('=')?;
    if !is_identifier(key) {
        return None;
    }
    Some((key.to_string(), unquote(raw)))
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner.to_string();
        }
    }
    // Unquoted values end at a trailing comment.
    match raw.find(" #") {
        Some(idx) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}
