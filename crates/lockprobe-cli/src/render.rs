//! Markdown table rendering for lockfiles and diffs.

use lockprobe_core::{Diff, Lockfile};

/// Summarizes a lockfile as a Markdown table, one row per package in
/// name order.
pub(crate) fn md_from_lockfile(lockfile: &Lockfile) -> String {
    let rows: Vec<Vec<String>> = lockfile
        .iter()
        .map(|package| vec![package.name.clone(), package.version.raw().to_string()])
        .collect();
    table(&["package", "version"], &rows)
}

/// Summarizes a diff as a Markdown table. Absent sides render as `-`;
/// source-change notes become a footnote list below the table.
pub(crate) fn md_from_diff(diff: &Diff) -> String {
    let rows: Vec<Vec<String>> = diff
        .packages
        .iter()
        .map(|(name, entry)| {
            let mut cell = name.clone();
            if let Some(id) = entry.note {
                cell.push_str(&format!("[^{}]", id + 1));
            }
            vec![
                cell,
                version_cell(entry.old.as_ref()),
                version_cell(entry.new.as_ref()),
            ]
        })
        .collect();

    let mut out = table(&["package", "old", "new"], &rows);
    if !diff.notes.is_empty() {
        out.push('\n');
        for (id, note) in diff.notes.iter().enumerate() {
            out.push_str(&format!("[^{}]: {note}\n", id + 1));
        }
    }
    out
}

fn version_cell(package: Option<&lockprobe_core::LockedPackage>) -> String {
    package.map_or_else(|| "-".to_string(), |p| p.version.raw().to_string())
}

/// Renders a Markdown table with columns padded to their widest cell.
fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|cell| cell.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    out.push_str(&line(header.iter().map(|cell| (*cell).to_string()), &widths));
    out.push_str("|-");
    out.push_str(
        &widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-|-"),
    );
    out.push_str("-|\n");
    for row in rows {
        out.push_str(&line(row.iter().cloned(), &widths));
    }
    out
}

fn line(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    format!("| {} |\n", padded.join(" | "))
}
