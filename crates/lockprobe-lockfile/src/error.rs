//! Errors specific to lockfile loading.

use thiserror::Error;

/// Errors raised while loading a `uv.lock` or `poetry.lock` document.
#[derive(Error, Debug)]
pub enum LockfileError {
    /// The file is not valid TOML at all.
    #[error("failed to parse lockfile TOML: {source}")]
    TomlParseError {
        #[source]
        source: toml_edit::TomlError,
    },

    /// Valid TOML, but neither a uv v1 nor a Poetry v2 lockfile.
    #[error("unrecognized lockfile format: {message}")]
    UnrecognizedFormat { message: String },

    /// A lockfile entry is missing a field its format requires.
    #[error("invalid lockfile entry: missing '{field}' in {section}")]
    MissingField { section: String, field: String },
}

/// Result type alias for lockfile operations.
pub type Result<T> = std::result::Result<T, LockfileError>;

impl LockfileError {
    /// Create an unrecognized-format error.
    pub fn unrecognized_format(message: impl Into<String>) -> Self {
        Self::UnrecognizedFormat {
            message: message.into(),
        }
    }

    /// Create a missing-field error.
    pub fn missing_field(section: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            section: section.into(),
            field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LockfileError::unrecognized_format("no version marker");
        assert_eq!(
            err.to_string(),
            "unrecognized lockfile format: no version marker"
        );

        let err = LockfileError::missing_field("package", "name");
        assert_eq!(
            err.to_string(),
            "invalid lockfile entry: missing 'name' in package"
        );
    }
}
