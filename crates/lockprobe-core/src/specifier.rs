//! Constraint expressions over versions, in two grammars.
//!
//! PEP 440 specifiers are comma-separated clauses (`>=1.7, <2.0`). Poetry
//! additionally supports shorthand prefix forms (`^1.2`, `~1.2`), bare
//! versions (`1.2`, `1.2.*`), and the explicit wildcard `*`. Both grammars
//! are unified through the closed [`Clause`] enum; every clause keeps its
//! raw text so that re-rendering an unmodified specifier reproduces the
//! input byte for byte.
//!
//! The central operation is [`Specifier::bump`]: move every lower-bound
//! clause up to a target version while preserving the clause's original
//! granularity, e.g. `>=3.5` bumped to `4.7.2` becomes `>=4.7`.

use crate::error::{CoreError, Result};
use crate::version::Version;
use std::cmp::Ordering;
use std::fmt;

/// Which constraint grammar a specifier was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// Comma-separated PEP 440 clauses, as used in PEP 508 requirement
    /// strings.
    Pep440,
    /// Poetry constraint syntax: PEP 440 operators plus `^`, `~`, bare
    /// versions, and `*`.
    Poetry,
}

/// Ordering comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl OrdOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// One operator+version term within a specifier.
///
/// Each variant knows its own lower-bound and granularity rules,
/// dispatched through closed matches rather than virtual dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `<`, `<=`, `>`, `>=`
    Ordered { op: OrdOp, version: Version },
    /// `==1.2` or the prefix form `==1.2.*`
    Equal { version: Version, prefix: bool },
    /// `!=1.2` or the prefix form `!=1.2.*`
    NotEqual { version: Version, prefix: bool },
    /// `===text`, arbitrary string equality
    ArbitraryEqual { text: String },
    /// `~=1.2`
    Compatible { version: Version },
    /// Poetry `^1.2`
    Caret { version: Version },
    /// Poetry `~1.2`
    Tilde { version: Version },
    /// Poetry bare version, exact (`1.2.3`) or prefix (`1.2.*`)
    Exact { version: Version, prefix: bool },
    /// Poetry `*`
    Unconstrained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawClause {
    /// Verbatim text of this clause, including surrounding whitespace.
    raw: String,
    clause: Clause,
}

/// An ordered list of clauses parsed from one constraint expression.
///
/// # Round-trip property
///
/// `Specifier::parse(text)?.render() == text` for any well-formed input;
/// only an explicit edit operation ([`Specifier::bump`] or
/// [`Specifier::reset`]) may change the rendering, and even then clauses
/// that were not touched keep their text verbatim.
///
/// # Examples
///
/// ```
/// use lockprobe_core::{Grammar, Specifier, Version};
///
/// let spec = Specifier::parse(">=3.5", Grammar::Pep440).unwrap();
/// let bumped = spec.bump(&Version::parse("4.7.2")).unwrap();
/// assert_eq!(bumped.render(), ">=4.7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    grammar: Grammar,
    clauses: Vec<RawClause>,
}

/// How [`Specifier::reset`] should rewrite a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetMode {
    /// Drop every constraint.
    Unconstrain,
    /// Replace all clauses with a single lower bound on this version.
    Minimum(Version),
}

impl Specifier {
    /// Parses a constraint expression.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ParseFailure`] when the text cannot be
    /// segmented into clauses at all. A clause whose version token does
    /// not parse is *not* a failure; the version is carried as an invalid
    /// value.
    pub fn parse(text: &str, grammar: Grammar) -> Result<Self> {
        match grammar {
            Grammar::Pep440 => Self::parse_pep440(text),
            Grammar::Poetry => Self::parse_poetry(text),
        }
    }

    fn parse_pep440(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self {
                grammar: Grammar::Pep440,
                clauses: Vec::new(),
            });
        }
        let clauses = text
            .split(',')
            .map(|segment| {
                let clause = parse_pep440_clause(segment)?;
                Ok(RawClause {
                    raw: segment.to_string(),
                    clause,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            grammar: Grammar::Pep440,
            clauses,
        })
    }

    fn parse_poetry(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CoreError::ParseFailure {
                text: text.into(),
                reason: "empty Poetry constraint".into(),
            });
        }
        if trimmed == "*" {
            return Ok(Self {
                grammar: Grammar::Poetry,
                clauses: vec![RawClause {
                    raw: text.to_string(),
                    clause: Clause::Unconstrained,
                }],
            });
        }
        // Ordinary PEP 440 operators may appear comma-separated, exactly
        // as in a PEP 508 specifier.
        if trimmed.starts_with(['<', '>', '=', '!']) || trimmed.starts_with("~=") {
            let mut spec = Self::parse_pep440(text)?;
            spec.grammar = Grammar::Poetry;
            return Ok(spec);
        }
        let clause = if let Some(rest) = trimmed.strip_prefix('^') {
            Clause::Caret {
                version: Version::parse(rest.trim()),
            }
        } else if let Some(rest) = trimmed.strip_prefix('~') {
            Clause::Tilde {
                version: Version::parse(rest.trim()),
            }
        } else if let Some(prefix) = trimmed.strip_suffix(".*") {
            Clause::Exact {
                version: Version::parse(prefix),
                prefix: true,
            }
        } else {
            // Bare versions act as exact pins.
            Clause::Exact {
                version: Version::parse(trimmed),
                prefix: false,
            }
        };
        Ok(Self {
            grammar: Grammar::Poetry,
            clauses: vec![RawClause {
                raw: text.to_string(),
                clause,
            }],
        })
    }

    /// The grammar this specifier was parsed under.
    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Whether this specifier has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Iterates over the parsed clauses.
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().map(|rc| &rc.clause)
    }

    /// Renders the specifier, reproducing unmodified clause text verbatim.
    pub fn render(&self) -> String {
        self.clauses
            .iter()
            .map(|rc| rc.raw.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether a version satisfies every clause.
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses
            .iter()
            .all(|rc| clause_contains(&rc.clause, version))
    }

    /// Number of explicit release components in the effective lower-bound
    /// clause (the lower-bound-capable clause with the greatest version).
    /// Zero if no lower bound exists.
    pub fn granularity(&self) -> usize {
        self.effective_lower_bound()
            .and_then(|v| v.release())
            .map_or(0, <[u64]>::len)
    }

    fn effective_lower_bound(&self) -> Option<&Version> {
        self.clauses
            .iter()
            .filter_map(|rc| lower_bound_version(&rc.clause))
            .filter(|v| v.is_valid())
            .max_by(|a, b| a.compare(b))
    }

    /// Moves every lower-bound clause up to `target`, truncated to the
    /// clause's original granularity. Clauses without lower-bound
    /// semantics are kept verbatim; if one of them would exclude the
    /// target, the whole bump is rejected with
    /// [`CoreError::BumpConflict`].
    ///
    /// A specifier without any lower bound gains a new `>=` clause at the
    /// default granularity (major.minor).
    pub fn bump(&self, target: &Version) -> Result<Self> {
        let mut clauses = Vec::with_capacity(self.clauses.len() + 1);
        let mut has_lower_bound = false;

        for rc in &self.clauses {
            let replacement = match &rc.clause {
                Clause::Ordered {
                    op: op @ (OrdOp::Lt | OrdOp::Le | OrdOp::Gt),
                    version,
                } => {
                    let kept = Clause::Ordered {
                        op: *op,
                        version: version.clone(),
                    };
                    if clause_contains(&kept, target) {
                        None
                    } else {
                        return Err(self.conflict(rc, target));
                    }
                }
                Clause::NotEqual { version, prefix } => {
                    let kept = Clause::NotEqual {
                        version: version.clone(),
                        prefix: *prefix,
                    };
                    if clause_contains(&kept, target) {
                        None
                    } else {
                        return Err(self.conflict(rc, target));
                    }
                }
                Clause::ArbitraryEqual { text } => {
                    if text == target.raw() {
                        None
                    } else {
                        return Err(self.conflict(rc, target));
                    }
                }
                Clause::Ordered {
                    op: OrdOp::Ge,
                    version,
                } => {
                    has_lower_bound = true;
                    bumped_bound(version, target, 1).map(|bound| Clause::Ordered {
                        op: OrdOp::Ge,
                        version: Version::parse(&bound),
                    })
                }
                Clause::Compatible { version } => {
                    has_lower_bound = true;
                    // `~=` needs at least two components to be well-formed.
                    bumped_bound(version, target, 2).map(|bound| Clause::Compatible {
                        version: Version::parse(&bound),
                    })
                }
                Clause::Caret { version } => {
                    has_lower_bound = true;
                    bumped_bound(version, target, 1).map(|bound| Clause::Caret {
                        version: Version::parse(&bound),
                    })
                }
                Clause::Tilde { version } => {
                    has_lower_bound = true;
                    bumped_bound(version, target, 1).map(|bound| Clause::Tilde {
                        version: Version::parse(&bound),
                    })
                }
                Clause::Equal { version, prefix } | Clause::Exact { version, prefix } => {
                    has_lower_bound = true;
                    let exact = matches!(rc.clause, Clause::Exact { .. });
                    let new = if *prefix {
                        let granularity = clause_granularity(version, 1);
                        let new_prefix = target.base_truncated(granularity);
                        if new_prefix == version.base_truncated(granularity)
                            && version.compare(&Version::parse(&new_prefix)) == Ordering::Equal
                        {
                            None
                        } else {
                            Some((Version::parse(&new_prefix), true))
                        }
                    } else if version.compare(target) == Ordering::Equal {
                        None
                    } else {
                        Some((target.clone(), false))
                    };
                    new.map(|(version, prefix)| {
                        if exact {
                            Clause::Exact { version, prefix }
                        } else {
                            Clause::Equal { version, prefix }
                        }
                    })
                }
                Clause::Unconstrained => {
                    // An explicit `*` is intentional; never pin it.
                    has_lower_bound = true;
                    None
                }
            };

            match replacement {
                None => clauses.push(rc.clone()),
                Some(clause) => {
                    let body = render_clause(&clause);
                    if body == rc.raw.trim() {
                        clauses.push(rc.clone());
                    } else {
                        clauses.push(RawClause {
                            raw: splice_body(&rc.raw, &body),
                            clause,
                        });
                    }
                }
            }
        }

        if !has_lower_bound {
            let version = Version::parse(&target.base_truncated(DEFAULT_GRANULARITY));
            let clause = Clause::Ordered {
                op: OrdOp::Ge,
                version,
            };
            clauses.push(RawClause {
                raw: render_clause(&clause),
                clause,
            });
        }

        Ok(Self {
            grammar: self.grammar,
            clauses,
        })
    }

    /// Replaces the whole specifier according to `mode`, discarding all
    /// prior clauses.
    ///
    /// Unconstraining renders as the empty specifier in the PEP 440
    /// grammar and as `*` in the Poetry grammar. The minimum mode uses
    /// the same default granularity as [`Specifier::bump`] when it
    /// introduces a new bound.
    pub fn reset(&self, mode: &ResetMode) -> Self {
        let clauses = match (mode, self.grammar) {
            (ResetMode::Unconstrain, Grammar::Pep440) => Vec::new(),
            (ResetMode::Unconstrain, Grammar::Poetry) => vec![RawClause {
                raw: "*".to_string(),
                clause: Clause::Unconstrained,
            }],
            (ResetMode::Minimum(target), _) => {
                let version = Version::parse(&target.base_truncated(DEFAULT_GRANULARITY));
                let clause = Clause::Ordered {
                    op: OrdOp::Ge,
                    version,
                };
                vec![RawClause {
                    raw: render_clause(&clause),
                    clause,
                }]
            }
        };
        Self {
            grammar: self.grammar,
            clauses,
        }
    }

    fn conflict(&self, rc: &RawClause, target: &Version) -> CoreError {
        CoreError::BumpConflict {
            specifier: self.render(),
            clause: rc.raw.trim().to_string(),
            target: target.raw().to_string(),
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Default number of release components when introducing a brand-new
/// lower bound (no prior constraint to take a granularity from).
const DEFAULT_GRANULARITY: usize = 2;

fn parse_pep440_clause(segment: &str) -> Result<Clause> {
    let body = segment.trim();
    let fail = |reason: &str| CoreError::ParseFailure {
        text: segment.to_string(),
        reason: reason.to_string(),
    };
    if body.is_empty() {
        return Err(fail("empty clause"));
    }

    if let Some(rest) = body.strip_prefix("===") {
        let text = rest.trim();
        if text.is_empty() {
            return Err(fail("missing version after operator"));
        }
        return Ok(Clause::ArbitraryEqual {
            text: text.to_string(),
        });
    }

    let (op, rest) = if let Some(rest) = body.strip_prefix("==") {
        ("==", rest)
    } else if let Some(rest) = body.strip_prefix("!=") {
        ("!=", rest)
    } else if let Some(rest) = body.strip_prefix("~=") {
        ("~=", rest)
    } else if let Some(rest) = body.strip_prefix(">=") {
        (">=", rest)
    } else if let Some(rest) = body.strip_prefix("<=") {
        ("<=", rest)
    } else if let Some(rest) = body.strip_prefix('>') {
        (">", rest)
    } else if let Some(rest) = body.strip_prefix('<') {
        ("<", rest)
    } else {
        return Err(fail("unknown operator"));
    };

    let version_text = rest.trim();
    if version_text.is_empty() {
        return Err(fail("missing version after operator"));
    }

    let clause = match op {
        "==" | "!=" => {
            let (text, prefix) = match version_text.strip_suffix(".*") {
                Some(stripped) => (stripped, true),
                None => (version_text, false),
            };
            let version = Version::parse(text);
            if op == "==" {
                Clause::Equal { version, prefix }
            } else {
                Clause::NotEqual { version, prefix }
            }
        }
        "~=" => Clause::Compatible {
            version: Version::parse(version_text),
        },
        ">=" => Clause::Ordered {
            op: OrdOp::Ge,
            version: Version::parse(version_text),
        },
        "<=" => Clause::Ordered {
            op: OrdOp::Le,
            version: Version::parse(version_text),
        },
        ">" => Clause::Ordered {
            op: OrdOp::Gt,
            version: Version::parse(version_text),
        },
        "<" => Clause::Ordered {
            op: OrdOp::Lt,
            version: Version::parse(version_text),
        },
        _ => unreachable!(),
    };
    Ok(clause)
}

fn render_clause(clause: &Clause) -> String {
    match clause {
        Clause::Ordered { op, version } => format!("{}{}", op.as_str(), version),
        Clause::Equal { version, prefix } => {
            if *prefix {
                format!("=={version}.*")
            } else {
                format!("=={version}")
            }
        }
        Clause::NotEqual { version, prefix } => {
            if *prefix {
                format!("!={version}.*")
            } else {
                format!("!={version}")
            }
        }
        Clause::ArbitraryEqual { text } => format!("==={text}"),
        Clause::Compatible { version } => format!("~={version}"),
        Clause::Caret { version } => format!("^{version}"),
        Clause::Tilde { version } => format!("~{version}"),
        Clause::Exact { version, prefix } => {
            if *prefix {
                format!("{version}.*")
            } else {
                version.to_string()
            }
        }
        Clause::Unconstrained => "*".to_string(),
    }
}

fn lower_bound_version(clause: &Clause) -> Option<&Version> {
    match clause {
        Clause::Ordered {
            op: OrdOp::Ge,
            version,
        }
        | Clause::Equal { version, .. }
        | Clause::Compatible { version }
        | Clause::Caret { version }
        | Clause::Tilde { version }
        | Clause::Exact { version, .. } => Some(version),
        _ => None,
    }
}

fn clause_granularity(version: &Version, minimum: usize) -> usize {
    version
        .release()
        .map_or(DEFAULT_GRANULARITY, <[u64]>::len)
        .max(minimum)
}

/// New lower-bound text for a clause at its original granularity, or
/// `None` when the clause already pins the target exactly.
fn bumped_bound(current: &Version, target: &Version, min_granularity: usize) -> Option<String> {
    if current.compare(target) == Ordering::Equal {
        return None;
    }
    Some(target.base_truncated(clause_granularity(current, min_granularity)))
}

/// Replaces the operator+version body of a raw clause while keeping its
/// surrounding whitespace.
fn splice_body(raw: &str, body: &str) -> String {
    let start = raw.len() - raw.trim_start().len();
    let end = raw.trim_end().len();
    format!("{}{}{}", &raw[..start], body, &raw[end..])
}

fn clause_contains(clause: &Clause, target: &Version) -> bool {
    match clause {
        Clause::Ordered { op, version } => {
            let ordering = target.compare(version);
            match op {
                OrdOp::Lt => ordering == Ordering::Less,
                OrdOp::Le => ordering != Ordering::Greater,
                OrdOp::Gt => ordering == Ordering::Greater,
                OrdOp::Ge => ordering != Ordering::Less,
            }
        }
        Clause::Equal { version, prefix } | Clause::Exact { version, prefix } => {
            equals(version, target, *prefix)
        }
        Clause::NotEqual { version, prefix } => !equals(version, target, *prefix),
        Clause::ArbitraryEqual { text } => text == target.raw(),
        Clause::Compatible { version } => {
            if target.compare(version) == Ordering::Less {
                return false;
            }
            match version.release() {
                Some(release) if release.len() >= 2 => {
                    release_prefix_matches(target, &release[..release.len() - 1])
                }
                _ => true,
            }
        }
        Clause::Caret { version } => {
            if target.compare(version) == Ordering::Less {
                return false;
            }
            match version.release() {
                Some(release) => below_release(target, &caret_upper(release)),
                None => false,
            }
        }
        Clause::Tilde { version } => {
            if target.compare(version) == Ordering::Less {
                return false;
            }
            match version.release() {
                Some(release) => below_release(target, &tilde_upper(release)),
                None => false,
            }
        }
        Clause::Unconstrained => true,
    }
}

fn equals(version: &Version, target: &Version, prefix: bool) -> bool {
    if prefix {
        return match version.release() {
            Some(release) => release_prefix_matches(target, release),
            None => version == target,
        };
    }
    if !version.is_valid() || !target.is_valid() {
        return version.raw() == target.raw();
    }
    // Local suffixes only participate when the clause pins one.
    if version.has_local() {
        version.compare(target) == Ordering::Equal
    } else {
        version.compare_public(target) == Ordering::Equal
    }
}

fn release_prefix_matches(target: &Version, prefix: &[u64]) -> bool {
    let Some(release) = target.release() else {
        return false;
    };
    prefix
        .iter()
        .enumerate()
        .all(|(i, &seg)| release.get(i).copied().unwrap_or(0) == seg)
}

fn below_release(target: &Version, bound: &[u64]) -> bool {
    let bound_text = bound
        .iter()
        .map(|seg| seg.to_string())
        .collect::<Vec<_>>()
        .join(".");
    target.compare(&Version::parse(&bound_text)) == Ordering::Less
}

/// Exclusive upper bound of a caret range: bump the leftmost nonzero
/// release segment (`^1.2.3` < 2, `^0.2.3` < 0.3, `^0.0.3` < 0.0.4).
fn caret_upper(release: &[u64]) -> Vec<u64> {
    let pivot = release
        .iter()
        .position(|&seg| seg != 0)
        .unwrap_or(release.len().saturating_sub(1));
    let mut upper = release[..=pivot].to_vec();
    upper[pivot] += 1;
    upper
}

/// Exclusive upper bound of a tilde range: bump the second segment when
/// present (`~1.2.3` < 1.3), else the first (`~1` < 2).
fn tilde_upper(release: &[u64]) -> Vec<u64> {
    if release.len() >= 2 {
        vec![release[0], release[1] + 1]
    } else {
        vec![release.first().copied().unwrap_or(0) + 1]
    }
}
