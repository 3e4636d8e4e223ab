//! The `lockprobe` binary: inspect and diff Python lockfiles, and edit
//! version constraints in `pyproject.toml`.

mod render;

use clap::{Parser, Subcommand, ValueEnum};
use lockprobe_core::{Lockfile, diff};
use lockprobe_lockfile::parse_lockfile;
use lockprobe_manifest::{EditReport, Manifest};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "lockprobe",
    version,
    about = "Inspect Python lockfiles and edit pyproject.toml constraints"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the packages resolved in a lockfile
    Inspect {
        lockfile: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Compare two lockfiles package by package
    Diff {
        old: PathBuf,
        new: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// List the requirements declared in a pyproject.toml
    Requirements { pyproject: PathBuf },
    /// Bump constraints to the locked versions, keeping granularity
    UpdateConstraints {
        lockfile: PathBuf,
        pyproject: PathBuf,
    },
    /// Drop every version constraint
    RemoveConstraints { pyproject: PathBuf },
    /// Replace each constraint with a lower bound on the locked version
    MinimizeConstraints {
        lockfile: PathBuf,
        pyproject: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Lockfile {
        path: PathBuf,
        #[source]
        source: lockprobe_lockfile::LockfileError,
    },
    #[error("{}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: lockprobe_manifest::ManifestError,
    },
    #[error("cannot serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Inspect { lockfile, format } => {
            let lock = load_lockfile(&lockfile)?;
            match format {
                OutputFormat::Json => print_json(&json!({ "packages": lock }))?,
                OutputFormat::Markdown => print!("{}", render::md_from_lockfile(&lock)),
            }
        }
        Command::Diff { old, new, format } => {
            let result = diff(&load_lockfile(&old)?, &load_lockfile(&new)?);
            match format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Markdown => print!("{}", render::md_from_diff(&result)),
            }
        }
        Command::Requirements { pyproject } => {
            let manifest = load_manifest(&pyproject)?;
            let (requirements, collisions) = manifest.requirements();
            for error in collisions {
                tracing::warn!(%error, "ambiguous requirement grouping");
            }
            print_json(&json!({ "requirements": requirements }))?;
        }
        Command::UpdateConstraints {
            lockfile,
            pyproject,
        } => {
            let lock = load_lockfile(&lockfile)?;
            edit_manifest(&pyproject, |manifest| manifest.update_constraints(&lock))?;
        }
        Command::RemoveConstraints { pyproject } => {
            edit_manifest(&pyproject, Manifest::remove_constraints)?;
        }
        Command::MinimizeConstraints {
            lockfile,
            pyproject,
        } => {
            let lock = load_lockfile(&lockfile)?;
            edit_manifest(&pyproject, |manifest| manifest.minimize_constraints(&lock))?;
        }
    }
    Ok(())
}

fn load_lockfile(path: &Path) -> Result<Lockfile, CliError> {
    let content = read(path)?;
    parse_lockfile(&content).map_err(|source| CliError::Lockfile {
        path: path.to_path_buf(),
        source,
    })
}

fn load_manifest(path: &Path) -> Result<Manifest, CliError> {
    let content = read(path)?;
    Manifest::parse(&content).map_err(|source| CliError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs one edit pass over the manifest at `path`, printing the report.
/// The document is written back only when the rendered content changed.
fn edit_manifest<F>(path: &Path, edit: F) -> Result<(), CliError>
where
    F: FnOnce(&mut Manifest) -> EditReport,
{
    let content = read(path)?;
    let mut manifest = Manifest::parse(&content).map_err(|source| CliError::Manifest {
        path: path.to_path_buf(),
        source,
    })?;
    let report = edit(&mut manifest);

    let rendered = manifest.render();
    if rendered != content {
        std::fs::write(path, rendered).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    print_json(&report)
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UV_LOCK: &str = r#"
version = 1

[[package]]
name = "requests"
version = "2.32.3"
source = { registry = "https://pypi.org/simple" }
"#;

    const PYPROJECT: &str = "[project]\ndependencies = [\"requests>=2.28\"]  # pinned\n";

    fn write_fixtures(dir: &Path) -> (PathBuf, PathBuf) {
        let lock_path = dir.join("uv.lock");
        let pyproject_path = dir.join("pyproject.toml");
        std::fs::write(&lock_path, UV_LOCK).unwrap();
        std::fs::write(&pyproject_path, PYPROJECT).unwrap();
        (lock_path, pyproject_path)
    }

    #[test]
    fn test_update_constraints_writes_edited_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let (lock_path, pyproject_path) = write_fixtures(dir.path());

        run(Command::UpdateConstraints {
            lockfile: lock_path,
            pyproject: pyproject_path.clone(),
        })
        .unwrap();

        let written = std::fs::read_to_string(&pyproject_path).unwrap();
        assert_eq!(
            written,
            "[project]\ndependencies = [\"requests>=2.32\"]  # pinned\n"
        );
    }

    #[test]
    fn test_unchanged_manifest_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let (lock_path, pyproject_path) = write_fixtures(dir.path());
        std::fs::write(&pyproject_path, "[project]\ndependencies = [\"requests>=2.32\"]\n")
            .unwrap();

        // A read-only manifest proves no write is attempted when the
        // edit pass is a no-op.
        let mut permissions = std::fs::metadata(&pyproject_path).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&pyproject_path, permissions).unwrap();

        run(Command::UpdateConstraints {
            lockfile: lock_path,
            pyproject: pyproject_path.clone(),
        })
        .unwrap();

        let mut permissions = std::fs::metadata(&pyproject_path).unwrap().permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        std::fs::set_permissions(&pyproject_path, permissions).unwrap();
    }

    #[test]
    fn test_missing_lockfile_is_a_read_error() {
        let error = run(Command::Inspect {
            lockfile: PathBuf::from("/nonexistent/uv.lock"),
            format: OutputFormat::Json,
        })
        .unwrap_err();
        assert!(matches!(error, CliError::Read { .. }));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["lockprobe", "diff", "old.lock", "new.lock", "--format", "markdown"])
            .unwrap();
        match cli.command {
            Command::Diff { old, new, format } => {
                assert_eq!(old, PathBuf::from("old.lock"));
                assert_eq!(new, PathBuf::from("new.lock"));
                assert_eq!(format, OutputFormat::Markdown);
            }
            _ => panic!("expected diff"),
        }
    }
}
