//! Format-preserving constraint editing for `pyproject.toml`.
//!
//! A [`Manifest`] wraps a `toml_edit` document plus an arena of located
//! requirement occurrences. Reads produce plain
//! [`lockprobe_core::Requirement`] values; edits replace only the
//! specifier substring of each selected entry, leaving every other byte
//! of the document alone.
//!
//! # Examples
//!
//! ```
//! use lockprobe_manifest::Manifest;
//!
//! let manifest = Manifest::parse(r#"
//! [project]
//! dependencies = ["requests>=2.28"]
//! "#).unwrap();
//!
//! let (requirements, _) = manifest.requirements();
//! assert_eq!(requirements[0].name, "requests");
//! assert_eq!(requirements[0].specifier, ">=2.28");
//! ```

mod editor;
pub mod error;
mod walker;

pub use editor::{ChangedConstraint, ConstraintIssue, EditOp, EditReport};
pub use error::{ManifestError, Result};

use lockprobe_core::{CoreError, Lockfile, Requirement, grouped_by_identity};
use toml_edit::DocumentMut;
use walker::Entry;

/// An editable pyproject.toml document with its requirement occurrences.
pub struct Manifest {
    doc: DocumentMut,
    entries: Vec<Entry>,
    parse_failures: Vec<CoreError>,
}

impl Manifest {
    /// Parses manifest content and collects its requirement occurrences.
    ///
    /// # Errors
    ///
    /// Fails only on malformed TOML. Requirement strings that cannot be
    /// split are collected into [`Manifest::parse_failures`] and the
    /// remaining entries stay usable.
    pub fn parse(content: &str) -> Result<Self> {
        let doc: DocumentMut = content
            .parse()
            .map_err(|source| ManifestError::TomlParseError { source })?;
        let (entries, parse_failures) = walker::collect_entries(&doc);
        Ok(Self {
            doc,
            entries,
            parse_failures,
        })
    }

    /// Requirement strings that could not be split during the load pass.
    pub fn parse_failures(&self) -> &[CoreError] {
        &self.parse_failures
    }

    /// The grouped requirements: occurrences sharing name and specifier
    /// text merge their group/extra memberships. Ambiguous merges are
    /// returned alongside, per
    /// [`lockprobe_core::CoreError::NameCollisionAmbiguous`].
    pub fn requirements(&self) -> (Vec<Requirement>, Vec<CoreError>) {
        let occurrences: Vec<Requirement> = self
            .entries
            .iter()
            .map(|entry| entry.requirement.clone())
            .collect();
        grouped_by_identity(&occurrences)
    }

    /// Bumps every requirement with a locked target to that version,
    /// preserving each clause's granularity.
    pub fn update_constraints(&mut self, lockfile: &Lockfile) -> EditReport {
        self.apply(EditOp::Bump, Some(lockfile))
    }

    /// Drops all version constraints.
    pub fn remove_constraints(&mut self) -> EditReport {
        self.apply(EditOp::Unconstrain, None)
    }

    /// Replaces each constraint with a plain lower bound on the locked
    /// version.
    pub fn minimize_constraints(&mut self, lockfile: &Lockfile) -> EditReport {
        self.apply(EditOp::Minimize, Some(lockfile))
    }

    fn apply(&mut self, op: EditOp, lockfile: Option<&Lockfile>) -> EditReport {
        let report = editor::apply(&mut self.doc, &self.entries, op, lockfile);
        // Spans recorded in the arena are stale after an edit.
        let (entries, parse_failures) = walker::collect_entries(&self.doc);
        self.entries = entries;
        self.parse_failures = parse_failures;
        report
    }

    /// Renders the document, byte-identical to the input except for
    /// applied edits.
    pub fn render(&self) -> String {
        self.doc.to_string()
    }
}
