//! Collects requirement occurrences from a pyproject.toml document.
//!
//! Walks `[project.dependencies]`, `[project.optional-dependencies.*]`,
//! `[dependency-groups.*]`, `[tool.poetry.dependencies]`, and
//! `[tool.poetry.group.*.dependencies]`. Each occurrence is recorded with
//! a location that addresses the specifier string inside the document, so
//! the editor can splice replacements without disturbing any other byte.

use lockprobe_core::{CoreError, Grammar, Requirement, RequirementParts, parse_requirement};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use toml_edit::{Array, DocumentMut, Item, TableLike, Value};

/// Where one requirement's specifier string lives in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Location {
    /// Element of a PEP 508 string array, e.g. `project.dependencies[3]`.
    ArrayItem {
        table: Vec<String>,
        key: String,
        index: usize,
    },
    /// Value of a Poetry dependency table entry, either the string itself
    /// or the `version` key of an inline table.
    TableValue {
        table: Vec<String>,
        key: String,
        in_version_key: bool,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArrayItem { table, key, index } => {
                write!(f, "{}.{key}[{index}]", table.join("."))
            }
            Self::TableValue { table, key, .. } => write!(f, "{}.{key}", table.join(".")),
        }
    }
}

/// One editable requirement occurrence.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) location: Location,
    pub(crate) grammar: Grammar,
    pub(crate) requirement: Requirement,
    pub(crate) parts: RequirementParts,
}

/// Walks the document. Requirement strings that cannot be split are
/// reported as failures and the walk continues.
pub(crate) fn collect_entries(doc: &DocumentMut) -> (Vec<Entry>, Vec<CoreError>) {
    let mut walker = Walker::default();

    if let Some(project) = table_of(doc.get("project")) {
        if let Some(deps) = array_of(project.get("dependencies")) {
            walker.requirements_array(deps, &["project"], "dependencies", &[], &[]);
        }
        if let Some(optional) = table_of(project.get("optional-dependencies")) {
            for (extra, item) in optional.iter() {
                if let Some(deps) = array_of(Some(item)) {
                    walker.requirements_array(
                        deps,
                        &["project", "optional-dependencies"],
                        extra,
                        &[],
                        &[extra.to_string()],
                    );
                }
            }
        }
    }

    if let Some(groups) = table_of(doc.get("dependency-groups")) {
        let attribution = group_attribution(groups);
        for (group, item) in groups.iter() {
            if let Some(deps) = array_of(Some(item)) {
                let memberships = attribution
                    .get(group)
                    .cloned()
                    .unwrap_or_else(|| BTreeSet::from([group.to_string()]));
                let memberships: Vec<String> = memberships.into_iter().collect();
                walker.requirements_array(deps, &["dependency-groups"], group, &memberships, &[]);
            }
        }
    }

    if let Some(poetry) = table_of(doc.get("tool")).and_then(|t| table_of(t.get("poetry"))) {
        if let Some(deps) = table_of(poetry.get("dependencies")) {
            walker.poetry_table(deps, &["tool", "poetry"], "dependencies", &[]);
        }
        if let Some(groups) = table_of(poetry.get("group")) {
            for (group, item) in groups.iter() {
                if let Some(deps) = table_of(Some(item)).and_then(|t| table_of(t.get("dependencies")))
                {
                    walker.poetry_table(
                        deps,
                        &["tool", "poetry", "group", group],
                        "dependencies",
                        &[group.to_string()],
                    );
                }
            }
        }
    }

    (walker.entries, walker.failures)
}

#[derive(Default)]
struct Walker {
    entries: Vec<Entry>,
    failures: Vec<CoreError>,
}

impl Walker {
    fn requirements_array(
        &mut self,
        array: &Array,
        table: &[&str],
        key: &str,
        groups: &[String],
        extras: &[String],
    ) {
        for (index, value) in array.iter().enumerate() {
            let Some(text) = value.as_str() else {
                // Non-string entries are include-group tables, handled
                // separately by the attribution pass.
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            match parse_requirement(text) {
                Ok(parts) => {
                    let mut requirement = Requirement::new(&parts.name, &parts.specifier);
                    requirement.extras = parts.extras.clone();
                    requirement.marker = parts.marker.clone();
                    for group in groups {
                        requirement = requirement.in_group(group);
                    }
                    for extra in extras {
                        requirement = requirement.in_extra(extra);
                    }
                    self.entries.push(Entry {
                        location: Location::ArrayItem {
                            table: table.iter().map(|s| s.to_string()).collect(),
                            key: key.to_string(),
                            index,
                        },
                        grammar: Grammar::Pep440,
                        requirement,
                        parts,
                    });
                }
                Err(error) => {
                    tracing::warn!(requirement = text, %error, "cannot split requirement");
                    self.failures.push(error);
                }
            }
        }
    }

    fn poetry_table(
        &mut self,
        deps: &dyn TableLike,
        table: &[&str],
        key: &str,
        groups: &[String],
    ) {
        for (name, item) in deps.iter() {
            // The python entry constrains the interpreter, not a package.
            if name == "python" {
                continue;
            }
            let (specifier, in_version_key) = match poetry_specifier_of(item) {
                Some(found) => found,
                None => continue,
            };
            let mut requirement = Requirement::new(name, specifier);
            for group in groups {
                requirement = requirement.in_group(group);
            }
            let specifier_len = specifier.len();
            self.entries.push(Entry {
                location: Location::TableValue {
                    table: table
                        .iter()
                        .map(|s| s.to_string())
                        .chain([key.to_string()])
                        .collect(),
                    key: name.to_string(),
                    in_version_key,
                },
                grammar: Grammar::Poetry,
                requirement,
                parts: RequirementParts {
                    name: name.to_string(),
                    extras: Vec::new(),
                    url: None,
                    specifier: specifier.to_string(),
                    specifier_span: 0..specifier_len,
                    marker: None,
                },
            });
        }
    }
}

/// A Poetry dependency value is either a plain string specifier or a
/// table carrying one under `version`. Path/git/url tables without a
/// `version` key have nothing to edit.
fn poetry_specifier_of(item: &Item) -> Option<(&str, bool)> {
    if let Some(text) = item.as_str() {
        return Some((text, false));
    }
    let version = item.as_table_like()?.get("version")?.as_str()?;
    Some((version, true))
}

/// Members of an included group are attributed to every including group
/// as an additional membership. Cycles are tolerated.
fn group_attribution(groups: &dyn TableLike) -> BTreeMap<String, BTreeSet<String>> {
    let mut includes: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (group, item) in groups.iter() {
        let Some(array) = array_of(Some(item)) else {
            continue;
        };
        for value in array.iter() {
            if let Value::InlineTable(entry) = value
                && let Some(included) = entry.get("include-group").and_then(Value::as_str)
            {
                includes.entry(group).or_default().push(included);
            }
        }
    }

    let mut attribution: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (group, _) in groups.iter() {
        attribution
            .entry(group.to_string())
            .or_default()
            .insert(group.to_string());
    }
    for (includer, _) in groups.iter() {
        let mut stack: Vec<&str> = vec![includer];
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(included) = includes.get(current) {
                for &member in included {
                    attribution
                        .entry(member.to_string())
                        .or_default()
                        .insert(includer.to_string());
                    stack.push(member);
                }
            }
        }
    }
    attribution
}

pub(crate) fn table_of(item: Option<&Item>) -> Option<&dyn TableLike> {
    item.and_then(Item::as_table_like)
}

fn array_of(item: Option<&Item>) -> Option<&Array> {
    item.and_then(Item::as_array)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries_of(content: &str) -> (Vec<Entry>, Vec<CoreError>) {
        let doc: DocumentMut = content.parse().unwrap();
        collect_entries(&doc)
    }

    #[test]
    fn test_collects_all_tables() {
        let (entries, failures) = entries_of(
            r#"
[project]
dependencies = ["requests>=2.28"]

[project.optional-dependencies]
cli = ["rich>=13"]

[dependency-groups]
dev = ["pytest>=8"]

[tool.poetry.dependencies]
python = "^3.12"
flask = "^3.0"

[tool.poetry.group.docs.dependencies]
sphinx = { version = "^7.0", extras = ["serve"] }
"#,
        );
        assert!(failures.is_empty());

        let names: Vec<&str> = entries.iter().map(|e| e.requirement.name.as_str()).collect();
        assert_eq!(names, vec!["requests", "rich", "pytest", "flask", "sphinx"]);

        assert!(entries[1].requirement.in_extras.contains("cli"));
        assert!(entries[2].requirement.in_groups.contains("dev"));
        assert_eq!(entries[3].grammar, Grammar::Poetry);
        assert!(entries[4].requirement.in_groups.contains("docs"));
        assert_eq!(entries[4].parts.specifier, "^7.0");
        assert!(matches!(
            entries[4].location,
            Location::TableValue { in_version_key: true, .. }
        ));
    }

    #[test]
    fn test_include_group_attribution() {
        let (entries, _) = entries_of(
            r#"
[dependency-groups]
dev = ["ruff>=0.8"]
test = [
    { include-group = "dev" },
    "pytest>=8",
]
"#,
        );

        let ruff = entries.iter().find(|e| e.requirement.name == "ruff").unwrap();
        let groups: Vec<&str> = ruff.requirement.in_groups.iter().map(String::as_str).collect();
        assert_eq!(groups, vec!["dev", "test"]);

        let pytest = entries.iter().find(|e| e.requirement.name == "pytest").unwrap();
        let groups: Vec<&str> = pytest.requirement.in_groups.iter().map(String::as_str).collect();
        assert_eq!(groups, vec!["test"]);
    }

    #[test]
    fn test_transitive_include_attribution() {
        let (entries, _) = entries_of(
            r#"
[dependency-groups]
base = ["tomli>=2"]
mid = [{ include-group = "base" }]
top = [{ include-group = "mid" }]
"#,
        );
        let tomli = entries.iter().find(|e| e.requirement.name == "tomli").unwrap();
        let groups: Vec<&str> = tomli.requirement.in_groups.iter().map(String::as_str).collect();
        assert_eq!(groups, vec!["base", "mid", "top"]);
    }

    #[test]
    fn test_python_entry_is_skipped() {
        let (entries, failures) = entries_of(
            r#"
[tool.poetry.dependencies]
python = "^3.12"
"#,
        );
        assert!(entries.is_empty());
        assert!(failures.is_empty());
    }

    #[test]
    fn test_unparsable_requirement_is_reported() {
        let (entries, failures) = entries_of(
            r#"
[project]
dependencies = [">=broken", "requests>=2.28"]
"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], CoreError::ParseFailure { .. }));
    }

    #[test]
    fn test_location_display() {
        let location = Location::ArrayItem {
            table: vec!["project".into()],
            key: "dependencies".into(),
            index: 2,
        };
        assert_eq!(location.to_string(), "project.dependencies[2]");
    }
}
