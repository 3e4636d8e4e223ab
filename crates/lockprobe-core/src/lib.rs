//! Core abstractions for lockprobe.
//!
//! This crate holds the pieces that are independent of any file format:
//! the version/specifier algebra, the requirement model, and the lockfile
//! diff engine.
//!
//! # Architecture
//!
//! lockprobe-core defines:
//! - **Versions**: a total PEP 440-style parser where unrecognized input
//!   becomes an `Invalid` value instead of an error
//! - **Specifiers**: constraint expressions in two grammars (PEP 440 and
//!   Poetry) with lossless round-trip rendering and granularity-preserving
//!   updates
//! - **Requirements**: one record per constraint occurrence in a manifest,
//!   with group/extra membership tracking
//! - **Diff**: classified comparison of two locked package maps
//!
//! The surrounding crates supply lockfile parsing (`lockprobe-lockfile`)
//! and the format-preserving manifest editor (`lockprobe-manifest`).

pub mod diff;
pub mod error;
pub mod requirement;
pub mod source;
pub mod specifier;
pub mod version;

pub use diff::{Diff, DiffEntry, DiffStat, Lockfile, LockedPackage, diff};
pub use error::{CoreError, Result};
pub use requirement::{
    Requirement, RequirementParts, grouped_by_identity, normalize_name, parse_requirement,
};
pub use source::Source;
pub use specifier::{Clause, Grammar, ResetMode, Specifier};
pub use version::{UNDEFINED_VERSION, Version};
