//! Applies constraint edits to the document.
//!
//! Every edit replaces only the specifier substring of the selected
//! entry: the new string value is spliced around the recorded byte span
//! and the old value's decor is carried over, so comments, whitespace,
//! and table ordering survive untouched.

use crate::walker::{Entry, Location};
use lockprobe_core::{CoreError, Lockfile, ResetMode, Specifier};
use serde::Serialize;
use toml_edit::{DocumentMut, Item, TableLike, Value};

/// Which rewrite to apply to each selected requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Bump lower bounds to the locked version, keeping granularity.
    Bump,
    /// Drop every constraint.
    Unconstrain,
    /// Replace each constraint with a plain lower bound on the locked
    /// version.
    Minimize,
}

/// One applied constraint change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedConstraint {
    pub name: String,
    pub location: String,
    pub old: String,
    pub new: String,
}

/// One requirement that could not be processed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintIssue {
    pub name: String,
    pub detail: String,
}

/// Outcome of one edit pass over the whole document.
///
/// Partial-failure semantics: parse failures and bump conflicts are
/// collected here per requirement; they never abort the remaining
/// entries. `skipped` lists packages that had no target in the lockfile,
/// which is expected for platform-specific entries that were never
/// resolved locally.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EditReport {
    pub changed: Vec<ChangedConstraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConstraintIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ConstraintIssue>,
}

pub(crate) fn apply(
    doc: &mut DocumentMut,
    entries: &[Entry],
    op: EditOp,
    lockfile: Option<&Lockfile>,
) -> EditReport {
    let mut report = EditReport::default();

    for entry in entries {
        let name = entry.requirement.name.as_str();
        if entry.parts.url.is_some() {
            tracing::debug!(name, "skipping direct-URL requirement");
            continue;
        }

        let target = lockfile.and_then(|lock| lock.get(name));
        if matches!(op, EditOp::Bump | EditOp::Minimize) && target.is_none() {
            report.skipped.push(name.to_string());
            continue;
        }

        let specifier = match Specifier::parse(&entry.parts.specifier, entry.grammar) {
            Ok(specifier) => specifier,
            Err(error) => {
                report.failures.push(issue(name, &error));
                continue;
            }
        };

        let rewritten = match op {
            EditOp::Bump => match target {
                Some(package) => match specifier.bump(&package.version) {
                    Ok(rewritten) => rewritten,
                    Err(error @ CoreError::BumpConflict { .. }) => {
                        report.conflicts.push(issue(name, &error));
                        continue;
                    }
                    Err(error) => {
                        report.failures.push(issue(name, &error));
                        continue;
                    }
                },
                None => continue,
            },
            EditOp::Unconstrain => specifier.reset(&ResetMode::Unconstrain),
            EditOp::Minimize => match target {
                Some(package) => {
                    specifier.reset(&ResetMode::Minimum(package.version.clone()))
                }
                None => continue,
            },
        };

        let new_specifier = rewritten.render();
        if new_specifier == entry.parts.specifier {
            continue;
        }
        if write_specifier(doc, entry, &new_specifier) {
            report.changed.push(ChangedConstraint {
                name: name.to_string(),
                location: entry.location.to_string(),
                old: entry.parts.specifier.clone(),
                new: new_specifier,
            });
        } else {
            tracing::warn!(name, location = %entry.location, "entry vanished during edit");
        }
    }

    report.skipped.sort_unstable();
    report.skipped.dedup();
    report
}

/// Splices the new specifier into the entry's string and writes it back,
/// keeping the old value's decor.
fn write_specifier(doc: &mut DocumentMut, entry: &Entry, new_specifier: &str) -> bool {
    let Some(value) = value_at(doc, &entry.location) else {
        return false;
    };
    let Some(old_text) = value.as_str() else {
        return false;
    };

    let span = &entry.parts.specifier_span;
    let mut new_text = String::with_capacity(old_text.len() + new_specifier.len());
    new_text.push_str(&old_text[..span.start]);
    new_text.push_str(new_specifier);
    new_text.push_str(&old_text[span.end..]);

    let decor = value.decor().clone();
    *value = Value::from(new_text);
    *value.decor_mut() = decor;
    true
}

fn value_at<'a>(doc: &'a mut DocumentMut, location: &Location) -> Option<&'a mut Value> {
    match location {
        Location::ArrayItem { table, key, index } => {
            let parent = table_at(doc, table)?;
            parent.get_mut(key)?.as_array_mut()?.get_mut(*index)
        }
        Location::TableValue {
            table,
            key,
            in_version_key,
        } => {
            let parent = table_at(doc, table)?;
            let item = parent.get_mut(key)?;
            if *in_version_key {
                item.as_table_like_mut()?.get_mut("version")?.as_value_mut()
            } else {
                item.as_value_mut()
            }
        }
    }
}

fn table_at<'a>(doc: &'a mut DocumentMut, path: &[String]) -> Option<&'a mut dyn TableLike> {
    let mut current: &mut dyn TableLike = doc.as_table_mut();
    for part in path {
        current = current.get_mut(part).and_then(Item::as_table_like_mut)?;
    }
    Some(current)
}

fn issue(name: &str, error: &CoreError) -> ConstraintIssue {
    ConstraintIssue {
        name: name.to_string(),
        detail: error.to_string(),
    }
}
