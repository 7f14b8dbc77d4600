//! Auxiliary chart files exposed to templates as `.Files`
//!
//! Files are held in memory, keyed by their path relative to the chart
//! root. Iteration is always in path order so that anything rendered from
//! a file set (config maps, secrets) is reproducible.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use glob::{MatchOptions, Pattern};

use crate::chart::ChartFile;
use crate::error::{CoreError, Result};

/// An immutable, cheaply clonable set of chart files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Files {
    entries: Arc<BTreeMap<String, Vec<u8>>>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl Files {
    /// Create an empty file set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a file set from chart files. Later entries win on duplicate names.
    pub fn from_chart_files(files: &[ChartFile]) -> Self {
        let entries = files
            .iter()
            .map(|f| (f.name.clone(), f.data.clone()))
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(path, content)` in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Raw content of a file
    pub fn get_bytes(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Content of a file as a string; a missing file reads as empty
    pub fn get(&self, path: &str) -> String {
        self.get_bytes(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Whether a file exists
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Files whose path matches a glob pattern
    ///
    /// `*` does not cross directory separators; `**` does.
    pub fn glob(&self, pattern: &str) -> Result<Files> {
        let glob_pattern = Pattern::new(pattern).map_err(|e| CoreError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let entries = self
            .entries
            .iter()
            .filter(|(path, _)| glob_pattern.matches_with(path, MATCH_OPTIONS))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    /// Lines of a file, without the trailing newline
    pub fn lines(&self, path: &str) -> Vec<String> {
        let Some(bytes) = self.get_bytes(path) else {
            return Vec::new();
        };
        let text = String::from_utf8_lossy(bytes);
        let text = text.strip_suffix('\n').unwrap_or(&text);
        text.split('\n').map(String::from).collect()
    }

    /// YAML map of base name to file content, for ConfigMap `data`
    pub fn as_config(&self) -> Result<String> {
        let map: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(path, data)| (base_name(path), String::from_utf8_lossy(data).into_owned()))
            .collect();
        to_yaml_block(&map)
    }

    /// YAML map of base name to base64 content, for Secret `data`
    pub fn as_secrets(&self) -> Result<String> {
        let map: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(path, data)| (base_name(path), STANDARD.encode(data)))
            .collect();
        to_yaml_block(&map)
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn to_yaml_block(map: &BTreeMap<&str, String>) -> Result<String> {
    if map.is_empty() {
        return Ok(String::new());
    }
    let yaml = serde_yaml::to_string(map)?;
    Ok(yaml.trim_end_matches('\n').to_string())
}
