//! Where a locked package was resolved from.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Resolution origin of a locked package.
///
/// A closed set: the two frontends (uv and Poetry) describe sources in
/// their own vocabulary, and the lockfile loaders fold both onto these
/// variants so the diff engine can compare origins across tools.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// The public PyPI index (pypi.org).
    PyPI,
    /// The tool's default registry, when the lockfile does not name one.
    DefaultRegistry,
    /// A source the loader could not classify.
    Other,
    /// A named package registry.
    Registry { url: String },
    /// A direct location: VCS URL, archive URL, or local path.
    Direct {
        location: String,
        subdirectory: Option<String>,
    },
}

impl Source {
    /// Whether two sources differ by value.
    pub fn differs_from(&self, other: &Self) -> bool {
        self != other
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PyPI => f.write_str("pypi"),
            Self::DefaultRegistry => f.write_str("default registry"),
            Self::Other => f.write_str("other"),
            Self::Registry { url } => f.write_str(url),
            Self::Direct {
                location,
                subdirectory,
            } => match subdirectory {
                Some(sub) => write!(f, "{location}#subdirectory={sub}"),
                None => f.write_str(location),
            },
        }
    }
}

// JSON shape: "pypi" | "default" | "other" | {"registry": url}
// | {"direct": location, "subdirectory": sub?}
impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::PyPI => serializer.serialize_str("pypi"),
            Self::DefaultRegistry => serializer.serialize_str("default"),
            Self::Other => serializer.serialize_str("other"),
            Self::Registry { url } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("registry", url)?;
                map.end()
            }
            Self::Direct {
                location,
                subdirectory,
            } => {
                let len = if subdirectory.is_some() { 2 } else { 1 };
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("direct", location)?;
                if let Some(sub) = subdirectory {
                    map.serialize_entry("subdirectory", sub)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_simple_variants() {
        assert_eq!(serde_json::to_value(Source::PyPI).unwrap(), json!("pypi"));
        assert_eq!(
            serde_json::to_value(Source::DefaultRegistry).unwrap(),
            json!("default")
        );
        assert_eq!(serde_json::to_value(Source::Other).unwrap(), json!("other"));
    }

    #[test]
    fn test_serialize_registry() {
        let source = Source::Registry {
            url: "https://example.com/simple".into(),
        };
        assert_eq!(
            serde_json::to_value(source).unwrap(),
            json!({"registry": "https://example.com/simple"})
        );
    }

    #[test]
    fn test_serialize_direct() {
        let source = Source::Direct {
            location: "git+https://github.com/pypa/packaging@abc123".into(),
            subdirectory: Some("pkg".into()),
        };
        assert_eq!(
            serde_json::to_value(source).unwrap(),
            json!({
                "direct": "git+https://github.com/pypa/packaging@abc123",
                "subdirectory": "pkg",
            })
        );
    }

    #[test]
    fn test_display_with_subdirectory() {
        let source = Source::Direct {
            location: "git+https://github.com/pypa/packaging@abc123".into(),
            subdirectory: Some("pkg".into()),
        };
        assert_eq!(
            source.to_string(),
            "git+https://github.com/pypa/packaging@abc123#subdirectory=pkg"
        );
    }

    #[test]
    fn test_value_comparison() {
        let a = Source::Registry {
            url: "https://example.com".into(),
        };
        let b = Source::Registry {
            url: "https://example.com".into(),
        };
        assert!(!a.differs_from(&b));
        assert!(a.differs_from(&Source::PyPI));
    }
}
