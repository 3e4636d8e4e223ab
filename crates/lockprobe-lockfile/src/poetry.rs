//! poetry.lock (lock-version 2.x) loader.

use crate::error::{LockfileError, Result};
use crate::vcs::{is_pypi_url, make_vcs_url};
use lockprobe_core::{LockedPackage, Lockfile, Source, Version};
use toml_edit::{DocumentMut, Item, TableLike};

/// Builds the package map from a parsed poetry.lock document.
pub(crate) fn lockfile_from_document(doc: &DocumentMut) -> Result<Lockfile> {
    let mut lockfile = Lockfile::new();
    let Some(packages) = doc.get("package").and_then(Item::as_array_of_tables) else {
        return Ok(lockfile);
    };

    for package in packages {
        let name = package
            .get("name")
            .and_then(Item::as_str)
            .ok_or_else(|| LockfileError::missing_field("package", "name"))?;
        let version = package
            .get("version")
            .and_then(Item::as_str)
            .ok_or_else(|| LockfileError::missing_field(format!("package '{name}'"), "version"))?;
        let source = package
            .get("source")
            .and_then(Item::as_table_like)
            .map_or(Source::DefaultRegistry, |table| map_source(name, table));
        lockfile.insert(LockedPackage::new(name, Version::parse(version), source));
    }

    Ok(lockfile)
}

// Poetry's source vocabulary: type is one of directory, file, url, git,
// hg, legacy, pypi; the pypi name is not case sensitive. Packages without
// a source table come from the default registry.
fn map_source(name: &str, source: &dyn TableLike) -> Source {
    let field = |key: &str| source.get(key).and_then(Item::as_str);
    let Some(kind) = field("type") else {
        tracing::warn!(package = name, "poetry source table without a type");
        return Source::Other;
    };

    if kind.eq_ignore_ascii_case("pypi") {
        return Source::PyPI;
    }
    match (kind, field("url")) {
        ("legacy", Some(url)) if is_pypi_url(url) => Source::PyPI,
        ("legacy", Some(url)) => Source::Registry {
            url: url.to_string(),
        },
        ("git", Some(url)) => {
            let subdirectory = field("subdirectory");
            match field("resolved_reference")
                .and_then(|rev| make_vcs_url("git", url, rev, subdirectory))
            {
                Some(location) => Source::Direct {
                    location,
                    subdirectory: None,
                },
                None => {
                    tracing::warn!(package = name, url, "cannot normalize poetry git source");
                    Source::Direct {
                        location: url.to_string(),
                        subdirectory: subdirectory.map(str::to_string),
                    }
                }
            }
        }
        ("url", Some(url)) => Source::Direct {
            location: url.to_string(),
            subdirectory: field("subdirectory").map(str::to_string),
        },
        ("directory" | "file", Some(url)) => Source::Direct {
            location: url.to_string(),
            subdirectory: None,
        },
        _ => {
            tracing::warn!(package = name, kind, "unrecognized poetry source table");
            Source::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(content: &str) -> Lockfile {
        let doc: DocumentMut = content.parse().unwrap();
        lockfile_from_document(&doc).unwrap()
    }

    #[test]
    fn test_default_and_pypi_sources() {
        let lockfile = load(
            r#"
[[package]]
name = "requests"
version = "2.32.3"

[[package]]
name = "flask"
version = "3.0.0"

[package.source]
type = "PyPI"

[metadata]
lock-version = "2.1"
content-hash = "abc"
"#,
        );

        assert_eq!(
            lockfile.get("requests").unwrap().source,
            Source::DefaultRegistry
        );
        assert_eq!(lockfile.get("flask").unwrap().source, Source::PyPI);
    }

    #[test]
    fn test_legacy_source_with_pypi_host() {
        let lockfile = load(
            r#"
[[package]]
name = "a"
version = "1.0"

[package.source]
type = "legacy"
url = "https://pypi.org/simple"

[[package]]
name = "b"
version = "1.0"

[package.source]
type = "legacy"
url = "https://mirror.example.com/simple"
"#,
        );

        assert_eq!(lockfile.get("a").unwrap().source, Source::PyPI);
        assert_eq!(
            lockfile.get("b").unwrap().source,
            Source::Registry {
                url: "https://mirror.example.com/simple".into()
            }
        );
    }

    #[test]
    fn test_git_source_builds_pip_url() {
        let lockfile = load(
            r#"
[[package]]
name = "mylib"
version = "0.3.0"

[package.source]
type = "git"
url = "https://example.com/mylib.git"
reference = "main"
resolved_reference = "1234abc"
subdirectory = "some/path"
"#,
        );

        assert_eq!(
            lockfile.get("mylib").unwrap().source,
            Source::Direct {
                location: "git+https://example.com/mylib.git@1234abc#subdirectory=some/path"
                    .into(),
                subdirectory: None
            }
        );
    }

    #[test]
    fn test_directory_and_url_sources() {
        let lockfile = load(
            r#"
[[package]]
name = "local"
version = "0.1.0"

[package.source]
type = "directory"
url = "../local"

[[package]]
name = "archive"
version = "2.0.0"

[package.source]
type = "url"
url = "https://example.com/archive.tar.gz"
subdirectory = "pkg"
"#,
        );

        assert_eq!(
            lockfile.get("local").unwrap().source,
            Source::Direct {
                location: "../local".into(),
                subdirectory: None
            }
        );
        assert_eq!(
            lockfile.get("archive").unwrap().source,
            Source::Direct {
                location: "https://example.com/archive.tar.gz".into(),
                subdirectory: Some("pkg".into())
            }
        );
    }

    #[test]
    fn test_unknown_source_type_maps_to_other() {
        let lockfile = load(
            r#"
[[package]]
name = "weird"
version = "1.0"

[package.source]
type = "hg"
url = "https://example.com/weird"
"#,
        );
        assert_eq!(lockfile.get("weird").unwrap().source, Source::Other);
    }

    #[test]
    fn test_missing_version_is_an_error() {
        let doc: DocumentMut = r#"
[[package]]
name = "incomplete"
"#
        .parse()
        .unwrap();
        assert!(matches!(
            lockfile_from_document(&doc),
            Err(LockfileError::MissingField { .. })
        ));
    }
}
