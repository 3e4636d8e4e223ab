//! Classified comparison of two locked package maps.

use crate::source::Source;
use crate::version::Version;
use serde::Serialize;
use std::collections::BTreeMap;

/// One resolved package from a lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedPackage {
    #[serde(skip)]
    pub name: String,
    pub version: Version,
    pub source: Source,
}

impl LockedPackage {
    pub fn new(name: &str, version: Version, source: Source) -> Self {
        Self {
            name: crate::requirement::normalize_name(name),
            version,
            source,
        }
    }
}

/// A loaded lockfile: normalized package name to locked package.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Lockfile {
    packages: BTreeMap<String, LockedPackage>,
}

impl Lockfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a package, replacing any previous entry with the same
    /// normalized name.
    pub fn insert(&mut self, package: LockedPackage) {
        self.packages.insert(package.name.clone(), package);
    }

    pub fn get(&self, name: &str) -> Option<&LockedPackage> {
        self.packages.get(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterates packages in name order.
    pub fn iter(&self) -> impl Iterator<Item = &LockedPackage> {
        self.packages.values()
    }
}

impl FromIterator<LockedPackage> for Lockfile {
    fn from_iter<I: IntoIterator<Item = LockedPackage>>(iter: I) -> Self {
        let mut lockfile = Self::new();
        for package in iter {
            lockfile.insert(package);
        }
        lockfile
    }
}

/// One package's change between two lockfiles.
///
/// Exactly one of `old` and `new` may be absent. The derived flags are
/// serialized only when true; `note` indexes into [`Diff::notes`].
#[derive(Debug, Clone, Serialize)]
pub struct DiffEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<LockedPackage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<LockedPackage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_major_change: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_downgrade: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_source_change: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<usize>,
}

/// Aggregate counters over the materialized diff entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub total: usize,
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

/// The full classified diff between two lockfiles.
#[derive(Debug, Clone, Serialize)]
pub struct Diff {
    pub packages: BTreeMap<String, DiffEntry>,
    pub stat: DiffStat,
    /// Deduplicated source-change descriptions; entries reference these
    /// by index via [`DiffEntry::note`].
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Compares two lockfiles package by package.
///
/// Over the union of package names: present only in old is **removed**,
/// only in new is **added**, present in both is **updated** iff version
/// or source differs, else the package is excluded entirely. Packages
/// are visited in name order, so note identifiers are assigned
/// deterministically in first-seen order.
pub fn diff(old: &Lockfile, new: &Lockfile) -> Diff {
    let mut names: Vec<&str> = old.iter().chain(new.iter()).map(|p| p.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();

    let mut packages = BTreeMap::new();
    let mut stat = DiffStat::default();
    let mut notes: Vec<String> = Vec::new();
    let mut note_ids: BTreeMap<String, usize> = BTreeMap::new();

    for name in names {
        let entry = match (old.get(name), new.get(name)) {
            (Some(before), None) => {
                stat.removed += 1;
                DiffEntry {
                    old: Some(before.clone()),
                    new: None,
                    is_major_change: false,
                    is_downgrade: false,
                    is_source_change: false,
                    note: None,
                }
            }
            (None, Some(after)) => {
                stat.added += 1;
                DiffEntry {
                    old: None,
                    new: Some(after.clone()),
                    is_major_change: false,
                    is_downgrade: false,
                    is_source_change: false,
                    note: None,
                }
            }
            (Some(before), Some(after)) => {
                let version_changed = before.version.raw() != after.version.raw();
                let is_source_change = before.source.differs_from(&after.source);
                if !version_changed && !is_source_change {
                    continue;
                }
                stat.updated += 1;
                let note = is_source_change.then(|| {
                    let text =
                        format!("source changed from {} to {}", before.source, after.source);
                    *note_ids.entry(text.clone()).or_insert_with(|| {
                        notes.push(text);
                        notes.len() - 1
                    })
                });
                DiffEntry {
                    old: Some(before.clone()),
                    new: Some(after.clone()),
                    is_major_change: version_changed && is_major_change(before, after),
                    is_downgrade: is_downgrade(before, after),
                    is_source_change,
                    note,
                }
            }
            (None, None) => unreachable!("name came from the union of both sides"),
        };
        packages.insert(name.to_string(), entry);
    }

    stat.total = packages.len();
    Diff {
        packages,
        stat,
        notes,
    }
}

/// Both versions valid: compare effective-major keys (epoch, first
/// segment, zero-ver second segment). Any transition through an invalid
/// version is conservatively major.
fn is_major_change(old: &LockedPackage, new: &LockedPackage) -> bool {
    match (old.version.major_key(), new.version.major_key()) {
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

fn is_downgrade(old: &LockedPackage, new: &LockedPackage) -> bool {
    old.version.is_valid()
        && new.version.is_valid()
        && new.version.compare(&old.version) == std::cmp::Ordering::Less
}
