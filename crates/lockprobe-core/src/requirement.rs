//! Requirement records and identity grouping.
//!
//! A [`Requirement`] is one constraint occurrence found in a manifest. The
//! splitter here understands just enough of the PEP 508 grammar to locate
//! the specifier substring inside a requirement string: name, optional
//! extras, optional direct URL (`name @ url`), optional environment marker
//! after `;`. The byte range of the specifier is reported so an editor can
//! splice a new specifier in without touching any other byte.

use crate::error::{CoreError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

static NAME_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_.]+").unwrap());

/// Normalizes a package, group, or extra name per the packaging rules:
/// lowercase, runs of `-`, `_`, `.` collapsed to a single `-`.
pub fn normalize_name(name: &str) -> String {
    NAME_SEPARATORS
        .replace_all(name.trim(), "-")
        .to_ascii_lowercase()
}

/// The split of one requirement string, with the specifier's byte range.
///
/// `specifier_span` addresses the original text: for `"flask >=1.7, <2.0"`
/// it covers `>=1.7, <2.0`. When the requirement carries no specifier the
/// span is empty, positioned where one would be inserted. Direct-URL
/// requirements (`name @ url`) have no specifier to edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementParts {
    /// Package name as written (not normalized).
    pub name: String,
    pub extras: Vec<String>,
    /// Direct reference target for `name @ url` requirements.
    pub url: Option<String>,
    /// Raw specifier text, possibly empty.
    pub specifier: String,
    /// Byte range of `specifier` within the original string.
    pub specifier_span: Range<usize>,
    /// Environment marker text after `;`, opaque.
    pub marker: Option<String>,
}

/// Splits a PEP 508 requirement string into its parts.
///
/// # Errors
///
/// Returns [`CoreError::ParseFailure`] when no package name can be read
/// or the extras bracket is unterminated.
pub fn parse_requirement(text: &str) -> Result<RequirementParts> {
    let fail = |reason: &str| CoreError::ParseFailure {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    // Marker first; nothing before the `;` may contain one.
    let (body_end, marker) = match text.find(';') {
        Some(pos) => {
            let marker = text[pos + 1..].trim();
            if marker.is_empty() {
                return Err(fail("empty environment marker"));
            }
            (pos, Some(marker.to_string()))
        }
        None => (text.len(), None),
    };
    let body = &text[..body_end];

    let name_start = body.len() - body.trim_start().len();
    let name_len = body[name_start..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(body.len() - name_start);
    if name_len == 0 {
        return Err(fail("missing package name"));
    }
    let name = body[name_start..name_start + name_len].to_string();
    let mut cursor = name_start + name_len;

    let mut extras = Vec::new();
    let after_name = &body[cursor..];
    let trimmed_offset = after_name.len() - after_name.trim_start().len();
    if after_name.trim_start().starts_with('[') {
        let open = cursor + trimmed_offset;
        let close = body[open..]
            .find(']')
            .ok_or_else(|| fail("unterminated extras bracket"))?;
        extras = body[open + 1..open + close]
            .split(',')
            .map(str::trim)
            .filter(|extra| !extra.is_empty())
            .map(str::to_string)
            .collect();
        cursor = open + close + 1;
    }

    let rest = &body[cursor..];
    if rest.trim_start().starts_with('@') {
        let url = rest.trim_start()[1..].trim().to_string();
        if url.is_empty() {
            return Err(fail("missing URL after @"));
        }
        return Ok(RequirementParts {
            name,
            extras,
            url: Some(url),
            specifier: String::new(),
            specifier_span: cursor..cursor,
            marker,
        });
    }

    // The specifier is whatever remains, excluding surrounding whitespace
    // and one optional level of parentheses.
    let mut start = cursor + (rest.len() - rest.trim_start().len());
    let mut end = cursor + rest.trim_end().len();
    if body[start..end].starts_with('(') && body[start..end].ends_with(')') && end - start >= 2 {
        start += 1;
        end -= 1;
    }
    if start > end {
        (start, end) = (cursor, cursor);
    }
    Ok(RequirementParts {
        name,
        extras,
        url: None,
        specifier: body[start..end].to_string(),
        specifier_span: start..end,
        marker,
    })
}

/// One constraint occurrence from a manifest.
///
/// `name`, groups, and extras memberships are stored normalized. The
/// specifier text is raw. A requirement never carries both group and
/// extra memberships; legacy-flavor documents may list several extras.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    pub specifier: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub in_groups: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub in_extras: BTreeSet<String>,
}

impl Requirement {
    /// A requirement with no memberships yet.
    pub fn new(name: &str, specifier: &str) -> Self {
        Self {
            name: normalize_name(name),
            specifier: specifier.to_string(),
            extras: Vec::new(),
            marker: None,
            in_groups: BTreeSet::new(),
            in_extras: BTreeSet::new(),
        }
    }

    /// Tags this occurrence with a dependency-group membership.
    pub fn in_group(mut self, group: &str) -> Self {
        self.in_groups.insert(normalize_name(group));
        self
    }

    /// Tags this occurrence with an optional-dependency extra membership.
    pub fn in_extra(mut self, extra: &str) -> Self {
        self.in_extras.insert(normalize_name(extra));
        self
    }
}

/// Collapses occurrences sharing `(name, specifier-text)` into one
/// requirement with unioned membership sets.
///
/// Occurrences with the same name but different specifier text stay
/// distinct: they are genuinely different constraints on the same
/// package. A merge that would leave one requirement with both group and
/// extra memberships is refused; the occurrences are kept distinct and a
/// [`CoreError::NameCollisionAmbiguous`] is reported alongside the
/// result, once per affected name.
pub fn grouped_by_identity(occurrences: &[Requirement]) -> (Vec<Requirement>, Vec<CoreError>) {
    let mut merged: BTreeMap<(String, String), Vec<Requirement>> = BTreeMap::new();
    let mut collisions: BTreeSet<String> = BTreeSet::new();

    for occurrence in occurrences {
        let key = (occurrence.name.clone(), occurrence.specifier.clone());
        let bucket = merged.entry(key).or_default();
        let mergeable = bucket.iter_mut().find(|existing| {
            let mixes_memberships = (!existing.in_groups.is_empty()
                && !occurrence.in_extras.is_empty())
                || (!existing.in_extras.is_empty() && !occurrence.in_groups.is_empty());
            !mixes_memberships
        });
        match mergeable {
            Some(existing) => {
                existing.in_groups.extend(occurrence.in_groups.iter().cloned());
                existing.in_extras.extend(occurrence.in_extras.iter().cloned());
                for extra in &occurrence.extras {
                    if !existing.extras.contains(extra) {
                        existing.extras.push(extra.clone());
                    }
                }
                if existing.marker != occurrence.marker {
                    existing.marker = None;
                }
            }
            None => {
                tracing::warn!(
                    name = %occurrence.name,
                    "requirement appears under both a group and an extra; keeping occurrences distinct"
                );
                collisions.insert(occurrence.name.clone());
                bucket.push(occurrence.clone());
            }
        }
    }

    let requirements = merged.into_values().flatten().collect();
    let errors = collisions
        .into_iter()
        .map(|name| CoreError::NameCollisionAmbiguous { name })
        .collect();
    (requirements, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Flask"), "flask");
        assert_eq!(normalize_name("typing_extensions"), "typing-extensions");
        assert_eq!(normalize_name("ruamel.yaml"), "ruamel-yaml");
        assert_eq!(normalize_name("a--b__c..d"), "a-b-c-d");
    }

    #[test]
    fn test_parse_plain_requirement() {
        let parts = parse_requirement("flask>=1.7,<2.0").unwrap();
        assert_eq!(parts.name, "flask");
        assert_eq!(parts.specifier, ">=1.7,<2.0");
        assert_eq!(&"flask>=1.7,<2.0"[parts.specifier_span.clone()], ">=1.7,<2.0");
        assert!(parts.extras.is_empty());
        assert_eq!(parts.marker, None);
    }

    #[test]
    fn test_parse_requirement_with_spaces() {
        let text = "flask >= 1.7, < 2.0";
        let parts = parse_requirement(text).unwrap();
        assert_eq!(parts.specifier, ">= 1.7, < 2.0");
        assert_eq!(&text[parts.specifier_span.clone()], ">= 1.7, < 2.0");
    }

    #[test]
    fn test_parse_requirement_with_extras_and_marker() {
        let text = "uvicorn[standard,watch] >=0.20 ; python_version >= '3.9'";
        let parts = parse_requirement(text).unwrap();
        assert_eq!(parts.name, "uvicorn");
        assert_eq!(parts.extras, vec!["standard", "watch"]);
        assert_eq!(parts.specifier, ">=0.20");
        assert_eq!(parts.marker.as_deref(), Some("python_version >= '3.9'"));
    }

    #[test]
    fn test_parse_requirement_without_specifier() {
        let text = "requests";
        let parts = parse_requirement(text).unwrap();
        assert_eq!(parts.specifier, "");
        assert!(parts.specifier_span.is_empty());
        assert_eq!(parts.specifier_span.start, text.len());
    }

    #[test]
    fn test_parse_direct_url_requirement() {
        let parts = parse_requirement("pip @ https://example.com/pip.whl").unwrap();
        assert_eq!(parts.name, "pip");
        assert_eq!(parts.url.as_deref(), Some("https://example.com/pip.whl"));
        assert_eq!(parts.specifier, "");
    }

    #[test]
    fn test_parse_parenthesized_specifier() {
        let text = "flask (>=1.7)";
        let parts = parse_requirement(text).unwrap();
        assert_eq!(parts.specifier, ">=1.7");
        assert_eq!(&text[parts.specifier_span.clone()], ">=1.7");
    }

    #[test]
    fn test_parse_requirement_failures() {
        assert!(parse_requirement("").is_err());
        assert!(parse_requirement(">=1.0").is_err());
        assert!(parse_requirement("foo[bar").is_err());
        assert!(parse_requirement("foo ;").is_err());
    }

    #[test]
    fn test_group_merging() {
        let occurrences = vec![
            Requirement::new("pytest", ">=8").in_group("dev"),
            Requirement::new("pytest", ">=8").in_group("types"),
        ];
        let (requirements, errors) = grouped_by_identity(&occurrences);
        assert!(errors.is_empty());
        assert_eq!(requirements.len(), 1);
        let groups: Vec<_> = requirements[0].in_groups.iter().cloned().collect();
        assert_eq!(groups, vec!["dev", "types"]);
    }

    #[test]
    fn test_different_specifiers_stay_distinct() {
        let occurrences = vec![
            Requirement::new("pytest", ">=8").in_group("dev"),
            Requirement::new("pytest", ">=7,<9").in_group("ci"),
        ];
        let (requirements, errors) = grouped_by_identity(&occurrences);
        assert!(errors.is_empty());
        assert_eq!(requirements.len(), 2);
    }

    #[test]
    fn test_membership_normalization_prevents_duplicates() {
        let occurrences = vec![
            Requirement::new("Pytest", ">=8").in_group("Dev_Tools"),
            Requirement::new("pytest", ">=8").in_group("dev-tools"),
        ];
        let (requirements, _) = grouped_by_identity(&occurrences);
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].in_groups.len(), 1);
    }

    #[test]
    fn test_group_extra_mix_is_ambiguous() {
        let occurrences = vec![
            Requirement::new("rich", ">=13").in_group("dev"),
            Requirement::new("rich", ">=13").in_extra("cli"),
        ];
        let (requirements, errors) = grouped_by_identity(&occurrences);
        assert_eq!(requirements.len(), 2);
        assert_eq!(
            errors,
            vec![CoreError::NameCollisionAmbiguous { name: "rich".into() }]
        );
    }

    #[test]
    fn test_marker_kept_only_when_identical() {
        let mut with_marker = Requirement::new("tomli", ">=2");
        with_marker.marker = Some("python_version < '3.11'".into());
        let occurrences = vec![with_marker.clone(), with_marker.clone()];
        let (requirements, _) = grouped_by_identity(&occurrences);
        assert_eq!(requirements[0].marker, with_marker.marker);

        let mut other = with_marker.clone();
        other.marker = None;
        let (requirements, _) = grouped_by_identity(&[with_marker, other]);
        assert_eq!(requirements[0].marker, None);
    }
}
