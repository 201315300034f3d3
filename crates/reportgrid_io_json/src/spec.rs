//! Read specification models and top-level error types.

use std::path::PathBuf;

use serde::Deserialize;

/// Input options for `read_json_documents`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecReadJsonOptions {
    /// Glob include patterns applied to file basename.
    pub patterns_include_files: Vec<String>,
    /// Glob exclude patterns applied to file basename.
    pub patterns_exclude_files: Vec<String>,
    /// Glob exclude patterns applied to directory basename.
    pub patterns_exclude_dirs: Vec<String>,
    /// Match patterns case-insensitively.
    pub if_case_insensitive: bool,
    /// Descend into subdirectories.
    pub if_recursive: bool,
    /// Maximum worker threads for the parse stage.
    pub num_workers_max: Option<usize>,
}

impl Default for SpecReadJsonOptions {
    fn default() -> Self {
        Self {
            patterns_include_files: vec!["*.json".to_string()],
            patterns_exclude_files: Vec::new(),
            patterns_exclude_dirs: Vec::new(),
            if_case_insensitive: true,
            if_recursive: true,
            num_workers_max: None,
        }
    }
}

/// One read failure item with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecReadJsonError {
    /// Failed source path.
    pub path: PathBuf,
    /// User-facing error text.
    pub exception: String,
}

/// "Top-level call failed" errors (input validation / setup stage).
#[derive(Debug, thiserror::Error)]
pub enum ReadJsonError {
    /// Invalid include/exclude pattern.
    #[error("Invalid pattern in include/exclude: {0}")]
    InvalidPattern(String),
    /// Source path is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
}
