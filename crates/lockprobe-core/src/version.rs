//! Version parsing and comparison.
//!
//! Parsing follows the PEP 440 grammar (epoch, release segments,
//! pre/post/dev markers, local suffix) but is *total*: any string that does
//! not match the grammar is retained as an invalid version carrying its
//! original text. Invalid versions are first-class values, never errors,
//! and sort after every valid version so orderings stay deterministic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Sentinel version for locked packages that carry no version at all.
///
/// The uv frontend does not guarantee that every locked package has a
/// version, e.g. editable installs with dynamic versions. Mapping those to
/// this sentinel keeps lockfile loading total.
pub const UNDEFINED_VERSION: &str = "0+undefined";

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?:[-_\.]?(?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)[-_\.]?(?P<pre_n>[0-9]+)?)?
        (?P<post>(?:-(?P<post_n1>[0-9]+))|(?:[-_\.]?(?:post|rev|r)[-_\.]?(?P<post_n2>[0-9]+)?))?
        (?P<dev>[-_\.]?dev[-_\.]?(?P<dev_n>[0-9]+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_\.][a-z0-9]+)*))?
        \s*$",
    )
    .unwrap()
});

/// Pre-release phase, ordered by PEP 440 precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum PreTag {
    Alpha,
    Beta,
    Rc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Parsed {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreTag, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
}

/// A version token, either parsed under the PEP 440 grammar or retained
/// verbatim as an invalid value.
///
/// Parsing is pure and total: every input maps to a `Version`, never an
/// error. Two invalid versions are equal only if their original text is
/// byte-identical.
///
/// # Examples
///
/// ```
/// use lockprobe_core::Version;
/// use std::cmp::Ordering;
///
/// let old = Version::parse("1.2");
/// let new = Version::parse("1.2.0");
/// assert_eq!(old.compare(&new), Ordering::Equal);
///
/// let weird = Version::parse("not-a-version");
/// assert!(!weird.is_valid());
/// assert_eq!(weird.raw(), "not-a-version");
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    parsed: Option<Parsed>,
}

impl Version {
    /// Parses a raw version token. Total: unrecognized input yields an
    /// invalid version carrying the original text.
    pub fn parse(text: &str) -> Self {
        let parsed = VERSION_RE.captures(text).and_then(|caps| {
            let epoch = match caps.name("epoch") {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            };
            let release = caps
                .name("release")?
                .as_str()
                .split('.')
                .map(|seg| seg.parse::<u64>().ok())
                .collect::<Option<Vec<_>>>()?;
            let pre = match caps.name("pre_l") {
                Some(tag) => {
                    let tag = match tag.as_str().to_ascii_lowercase().as_str() {
                        "a" | "alpha" => PreTag::Alpha,
                        "b" | "beta" => PreTag::Beta,
                        // `c`, `pre`, and `preview` are rc aliases
                        _ => PreTag::Rc,
                    };
                    let n = match caps.name("pre_n") {
                        Some(m) => m.as_str().parse().ok()?,
                        None => 0,
                    };
                    Some((tag, n))
                }
                None => None,
            };
            let post = if caps.name("post").is_some() {
                let n = caps
                    .name("post_n1")
                    .or_else(|| caps.name("post_n2"))
                    .map_or(Some(0), |m| m.as_str().parse().ok())?;
                Some(n)
            } else {
                None
            };
            let dev = if caps.name("dev").is_some() {
                let n = caps
                    .name("dev_n")
                    .map_or(Some(0), |m| m.as_str().parse().ok())?;
                Some(n)
            } else {
                None
            };
            let local = caps
                .name("local")
                .map(|m| m.as_str().to_ascii_lowercase());
            Some(Parsed {
                epoch,
                release,
                pre,
                post,
                dev,
                local,
            })
        });

        Self {
            raw: text.to_string(),
            parsed,
        }
    }

    /// The sentinel version for packages without a lockable version.
    pub fn undefined() -> Self {
        Self::parse(UNDEFINED_VERSION)
    }

    /// The original text of this version.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether this version parsed under the PEP 440 grammar.
    pub fn is_valid(&self) -> bool {
        self.parsed.is_some()
    }

    /// The explicit release segments, e.g. `[4, 7, 2]` for `4.7.2`.
    ///
    /// Returns `None` for invalid versions.
    pub fn release(&self) -> Option<&[u64]> {
        self.parsed.as_ref().map(|p| p.release.as_slice())
    }

    /// Total order over all versions.
    ///
    /// Valid versions compare by epoch, then release segments (the shorter
    /// sequence zero-padded, so `1.2 == 1.2.0`), then dev/pre/post
    /// precedence, then local suffix as a best-effort tie-break. Invalid
    /// versions sort after every valid version, ordered among themselves
    /// by raw text.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => a.cmp_key(b, true),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }

    /// Like [`Self::compare`], but ignoring any local-version suffix.
    ///
    /// `==` and `!=` clauses compare public versions unless the clause
    /// itself pins a local suffix.
    pub fn compare_public(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => a.cmp_key(b, false),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }

    /// Whether this version pins a local suffix (`+something`).
    pub fn has_local(&self) -> bool {
        self.parsed
            .as_ref()
            .is_some_and(|p| p.local.is_some())
    }

    /// Classification key for major-change detection.
    ///
    /// Covers the epoch, the first release segment, and, for zero-ver
    /// releases (`0.x.y`), the second segment: under the zero-ver
    /// convention a `0.y` bump counts as a major-equivalent change.
    /// Returns `None` for invalid versions.
    pub fn major_key(&self) -> Option<(u64, u64, u64)> {
        let p = self.parsed.as_ref()?;
        let first = p.release.first().copied().unwrap_or(0);
        let zero_ver = if first == 0 {
            p.release.get(1).copied().unwrap_or(0)
        } else {
            0
        };
        Some((p.epoch, first, zero_ver))
    }

    /// The base version truncated to `granularity` release segments.
    ///
    /// `4.7.2` at granularity 2 renders as `4.7`; fewer segments than the
    /// requested granularity are rendered as-is, never zero-padded.
    /// Invalid versions render their raw text unchanged.
    pub fn base_truncated(&self, granularity: usize) -> String {
        match &self.parsed {
            Some(p) => {
                let keep = granularity.clamp(1, p.release.len());
                p.release[..keep]
                    .iter()
                    .map(|seg| seg.to_string())
                    .collect::<Vec<_>>()
                    .join(".")
            }
            None => self.raw.clone(),
        }
    }
}

impl Parsed {
    fn cmp_key(&self, other: &Self, with_local: bool) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_release(&self.release, &other.release))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| {
                if with_local {
                    cmp_local(self.local.as_deref(), other.local.as_deref())
                } else {
                    Ordering::Equal
                }
            })
    }

    fn pre_key(&self) -> PreKey {
        match self.pre {
            Some((tag, n)) => PreKey::Pre(tag, n),
            // A bare dev release sorts before any pre-release of the
            // same release tuple: 1.0.dev1 < 1.0a1 < 1.0.
            None if self.post.is_none() && self.dev.is_some() => PreKey::DevOnly,
            None => PreKey::Final,
        }
    }

    fn dev_key(&self) -> (u8, u64) {
        match self.dev {
            Some(n) => (0, n),
            None => (1, 0),
        }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(PreTag, u64),
    Final,
}

fn cmp_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

fn cmp_local(a: Option<&str>, b: Option<&str>) -> Ordering {
    fn part_key(part: &str) -> (u8, u64, &str) {
        // Numeric parts sort after string parts at the same position.
        match part.parse::<u64>() {
            Ok(n) => (1, n, ""),
            Err(_) => (0, 0, part),
        }
    }
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let a: Vec<_> = a.split('.').map(part_key).collect();
            let b: Vec<_> = b.split('.').map(part_key).collect();
            a.cmp(&b)
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        // Same raw text always yields the same parse, so byte equality
        // is the identity. Semantic equality goes through `compare`.
        self.raw == other.raw
    }
}

impl Eq for Version {}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Version {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.is_empty() {
            return Err(D::Error::custom("version string must not be empty"));
        }
        Ok(Self::parse(&text))
    }
}
