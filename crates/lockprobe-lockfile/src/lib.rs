//! Lockfile loaders for lockprobe.
//!
//! Detects and parses `uv.lock` (schema v1) and `poetry.lock`
//! (lock-version 2.x) documents into the shared
//! [`lockprobe_core::Lockfile`] package map. Both loaders are total over
//! versions: an unparsable version token becomes an invalid
//! [`lockprobe_core::Version`] value, and uv packages without a version
//! get the `0+undefined` sentinel.
//!
//! # Examples
//!
//! ```
//! let content = r#"
//! version = 1
//!
//! [[package]]
//! name = "requests"
//! version = "2.32.3"
//! source = { registry = "https://pypi.org/simple" }
//! "#;
//!
//! let lockfile = lockprobe_lockfile::parse_lockfile(content).unwrap();
//! assert_eq!(lockfile.get("requests").unwrap().version.raw(), "2.32.3");
//! ```

pub mod error;
mod poetry;
mod uv;
pub mod vcs;

pub use error::{LockfileError, Result};

use lockprobe_core::Lockfile;
use toml_edit::{DocumentMut, Item};

/// Which lockfile format a document was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockfileFlavor {
    UvV1,
    PoetryV2,
}

/// Detects the lockfile flavor of a TOML document.
///
/// uv pins its compatibility promises to the schema version marker
/// (`version = 1`); Poetry carries a `[metadata]` table with a
/// `lock-version` key.
pub fn detect_flavor(doc: &DocumentMut) -> Option<LockfileFlavor> {
    if doc.get("version").and_then(Item::as_integer) == Some(1) && doc.contains_key("package") {
        return Some(LockfileFlavor::UvV1);
    }
    let metadata = doc.get("metadata").and_then(Item::as_table_like);
    if metadata.is_some_and(|table| table.contains_key("lock-version")) {
        return Some(LockfileFlavor::PoetryV2);
    }
    None
}

/// Parses lockfile content, auto-detecting the format.
///
/// # Errors
///
/// Returns [`LockfileError::TomlParseError`] for malformed TOML,
/// [`LockfileError::UnrecognizedFormat`] when the document is neither
/// flavor, and [`LockfileError::MissingField`] for entries without the
/// fields their format requires.
pub fn parse_lockfile(content: &str) -> Result<Lockfile> {
    let doc: DocumentMut = content
        .parse()
        .map_err(|source| LockfileError::TomlParseError { source })?;

    match detect_flavor(&doc) {
        Some(LockfileFlavor::UvV1) => uv::lockfile_from_document(&doc),
        Some(LockfileFlavor::PoetryV2) => poetry::lockfile_from_document(&doc),
        None => Err(LockfileError::unrecognized_format(
            "expected uv.lock v1 (version = 1) or poetry.lock v2 ([metadata] lock-version)",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_uv() {
        let doc: DocumentMut = "version = 1\n\n[[package]]\nname = \"a\"\nversion = \"1.0\"\nsource = { registry = \"https://pypi.org/simple\" }\n"
            .parse()
            .unwrap();
        assert_eq!(detect_flavor(&doc), Some(LockfileFlavor::UvV1));
    }

    #[test]
    fn test_detects_poetry() {
        let doc: DocumentMut = "[metadata]\nlock-version = \"2.1\"\n".parse().unwrap();
        assert_eq!(detect_flavor(&doc), Some(LockfileFlavor::PoetryV2));
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(matches!(
            parse_lockfile("[stuff]\nkey = 1\n"),
            Err(LockfileError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            parse_lockfile("not toml {{{"),
            Err(LockfileError::TomlParseError { .. })
        ));
    }
}
