//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("type mismatch on {chart}: {found}")]
    TypeMismatch { chart: String, found: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Duplicate dependency '{name}' in chart '{chart}'")]
    DuplicateDependency { chart: String, name: String },

    #[error("Duplicate template '{name}' in chart '{chart}'")]
    DuplicateTemplate { chart: String, name: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
