use thiserror::Error;

/// Core error types for lockprobe.
///
/// Only structural failures are errors. An unrecognized version string is
/// *not* an error: it becomes an invalid [`crate::Version`] value and keeps
/// flowing through diffing and classification.
///
/// # Examples
///
/// ```
/// use lockprobe_core::error::{CoreError, Result};
///
/// fn parse_clauses(text: &str) -> Result<()> {
///     if text.trim().is_empty() {
///         return Err(CoreError::ParseFailure {
///             text: text.into(),
///             reason: "empty clause".into(),
///         });
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The specifier grammar could not be segmented into clauses at all.
    ///
    /// Fatal for the requirement involved, but callers are expected to
    /// keep processing the remaining requirements and report all failures
    /// together.
    #[error("failed to parse specifier {text:?}: {reason}")]
    ParseFailure { text: String, reason: String },

    /// A bump would violate an upper-bound or exclusion clause.
    ///
    /// This is an expected, recoverable condition: the requirement keeps
    /// its old specifier and the conflict is reported as a warning.
    #[error("cannot bump {specifier:?} to {target}: clause {clause:?} excludes the target")]
    BumpConflict {
        specifier: String,
        clause: String,
        target: String,
    },

    /// Two occurrences normalize to the same identity but carry
    /// incompatible membership semantics (groups vs extras).
    #[error("ambiguous requirement identity for {name:?}: cannot merge group and extra membership")]
    NameCollisionAmbiguous { name: String },
}

/// Convenience type alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;
