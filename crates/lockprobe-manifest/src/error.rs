//! Errors specific to manifest handling.
//!
//! Per-requirement problems (specifier parse failures, bump conflicts)
//! are not errors here: they are collected into the
//! [`crate::EditReport`] so the rest of the document keeps processing.

use thiserror::Error;

/// Errors raised while loading a `pyproject.toml` document.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The file is not valid TOML at all.
    #[error("failed to parse pyproject.toml: {source}")]
    TomlParseError {
        #[source]
        source: toml_edit::TomlError,
    },
}

/// Result type alias for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;
