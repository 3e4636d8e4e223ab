//! uv.lock (schema v1) loader.

use crate::error::{LockfileError, Result};
use crate::vcs::{is_pypi_url, vcs_url_from_uv_direct};
use lockprobe_core::{LockedPackage, Lockfile, Source, Version};
use toml_edit::{DocumentMut, Item, TableLike};

/// Builds the package map from a parsed uv.lock document.
///
/// uv does not guarantee a version for every package (editable installs
/// with dynamic versions); those map to the `0+undefined` sentinel.
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
            .map_or_else(Version::undefined, Version::parse);
        let source = package
            .get("source")
            .and_then(Item::as_table_like)
            .ok_or_else(|| LockfileError::missing_field(format!("package '{name}'"), "source"))?;
        lockfile.insert(LockedPackage::new(name, version, map_source(name, source)));
    }

    Ok(lockfile)
}

// The lockfile source fields do not match the [tool.uv.sources] manifest
// syntax; they are uv's resolver-output vocabulary: registry, git, url
// (+subdirectory), and the path-style fields.
fn map_source(name: &str, source: &dyn TableLike) -> Source {
    let field = |key: &str| source.get(key).and_then(Item::as_str);

    if let Some(registry) = field("registry") {
        if is_pypi_url(registry) {
            return Source::PyPI;
        }
        return Source::Registry {
            url: registry.to_string(),
        };
    }
    if let Some(git) = field("git") {
        return match vcs_url_from_uv_direct("git", git) {
            Some(location) => Source::Direct {
                location,
                subdirectory: None,
            },
            None => {
                tracing::warn!(package = name, url = git, "cannot normalize uv git URL");
                Source::Direct {
                    location: git.to_string(),
                    subdirectory: None,
                }
            }
        };
    }
    if let Some(url) = field("url") {
        return Source::Direct {
            location: url.to_string(),
            subdirectory: field("subdirectory").map(str::to_string),
        };
    }
    for key in ["path", "directory", "editable", "virtual"] {
        if let Some(location) = field(key) {
            return Source::Direct {
                location: location.to_string(),
                subdirectory: None,
            };
        }
    }

    tracing::warn!(package = name, "unrecognized uv source table");
    Source::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(content: &str) -> Lockfile {
        let doc: DocumentMut = content.parse().unwrap();
        lockfile_from_document(&doc).unwrap()
    }

    #[test]
    fn test_registry_sources() {
        let lockfile = load(
            r#"
version = 1

[[package]]
name = "requests"
version = "2.32.3"
source = { registry = "https://pypi.org/simple" }

[[package]]
name = "internal-tool"
version = "1.0.0"
source = { registry = "https://mirror.example.com/simple" }
"#,
        );

        assert_eq!(lockfile.get("requests").unwrap().source, Source::PyPI);
        assert_eq!(
            lockfile.get("internal-tool").unwrap().source,
            Source::Registry {
                url: "https://mirror.example.com/simple".into()
            }
        );
    }

    #[test]
    fn test_missing_version_gets_sentinel() {
        let lockfile = load(
            r#"
version = 1

[[package]]
name = "my-editable"
source = { editable = "." }
"#,
        );

        let package = lockfile.get("my-editable").unwrap();
        assert_eq!(package.version.raw(), "0+undefined");
        assert_eq!(
            package.source,
            Source::Direct {
                location: ".".into(),
                subdirectory: None
            }
        );
    }

    #[test]
    fn test_git_source_is_normalized() {
        let lockfile = load(
            r#"
version = 1

[[package]]
name = "mylib"
version = "0.3.0"
source = { git = "https://example.com/mylib.git?branch=main#abcd123" }
"#,
        );

        assert_eq!(
            lockfile.get("mylib").unwrap().source,
            Source::Direct {
                location: "git+https://example.com/mylib.git@abcd123".into(),
                subdirectory: None
            }
        );
    }

    #[test]
    fn test_url_source_with_subdirectory() {
        let lockfile = load(
            r#"
version = 1

[[package]]
name = "bundled"
version = "1.1.0"
source = { url = "https://example.com/bundle.tar.gz", subdirectory = "pkg" }
"#,
        );

        assert_eq!(
            lockfile.get("bundled").unwrap().source,
            Source::Direct {
                location: "https://example.com/bundle.tar.gz".into(),
                subdirectory: Some("pkg".into())
            }
        );
    }

    #[test]
    fn test_unknown_source_maps_to_other() {
        let lockfile = load(
            r#"
version = 1

[[package]]
name = "mystery"
version = "1.0"
source = { exotic = "???" }
"#,
        );
        assert_eq!(lockfile.get("mystery").unwrap().source, Source::Other);
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let doc: DocumentMut = r#"
version = 1

[[package]]
version = "1.0"
source = { registry = "https://pypi.org/simple" }
"#
        .parse()
        .unwrap();
        assert!(matches!(
            lockfile_from_document(&doc),
            Err(LockfileError::MissingField { .. })
        ));
    }
}
