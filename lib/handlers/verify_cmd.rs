//! `plugin-index verify` handler.
//!
//! Read-only consistency checks between the index and the artifact folders.

use super::common::plural;
use crate::artifact::ArtifactLayout;
use crate::commands::KindArg;
use crate::component::{Branch, ComponentKind};
use crate::config::IndexerConfig;
use crate::error::IndexResult;
use crate::store::IndexStore;
use crate::version::Version;
use colored::Colorize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Exit code when verification finds problems.
pub const VERIFY_FAILED_EXIT_CODE: i32 = 5;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An inconsistency found by `verify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ComponentKind,
    pub name: String,
    pub branch: Branch,
    pub problem: Problem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// The main branch records a pre-release.
    PrereleaseOnMain { version: Version },

    /// More than one current artifact for the branch.
    MultipleCurrent { artifacts: Vec<PathBuf> },

    /// The recorded artifact is not on disk.
    MissingArtifact { path: PathBuf },

    /// The current artifact on disk is not the recorded version.
    VersionMismatch { recorded: Version, on_disk: Version },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Problem {
    pub fn code(&self) -> &'static str {
        match self {
            Self::PrereleaseOnMain { .. } => "prerelease-on-main",
            Self::MultipleCurrent { .. } => "ambiguous-artifacts",
            Self::MissingArtifact { .. } => "missing-artifact",
            Self::VersionMismatch { .. } => "version-mismatch",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrereleaseOnMain { version } => {
                write!(f, "pre-release {} recorded on main", version)
            }
            Self::MultipleCurrent { artifacts } => {
                write!(f, "{} current artifacts:", artifacts.len())?;
                for artifact in artifacts {
                    write!(f, " {}", artifact.display())?;
                }
                Ok(())
            }
            Self::MissingArtifact { path } => write!(f, "artifact missing: {}", path.display()),
            Self::VersionMismatch { recorded, on_disk } => {
                write!(f, "index records {} but {} is on disk", recorded, on_disk)
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Verify the index from the command line. Returns the number of violations.
pub fn index_verify(config: &IndexerConfig, kind: Option<KindArg>, quiet: bool) -> IndexResult<usize> {
    let store = IndexStore::load(&config.index_path())?;
    let violations = verify_index(&store, &config.layout(), &KindArg::select(kind))?;

    for v in &violations {
        println!(
            "  {}: → {} {} ({})",
            format!("error[{}]", v.problem.code()).bright_red().bold(),
            v.kind,
            v.name.bold(),
            v.branch
        );
        println!("      {} {}", "└─".dimmed(), v.problem.to_string().dimmed());
    }

    if violations.is_empty() {
        if !quiet {
            println!("  {} Index is consistent", "✓".bright_green());
        }
    } else {
        println!();
        println!(
            "  {} {}",
            "✗".bright_red(),
            plural(violations.len(), "violation")
        );
    }

    Ok(violations.len())
}

/// Check the index against the artifact folders without modifying either.
///
/// Component folders are found both through the index and by listing the
/// kind folder, so stray artifacts of unindexed components are checked too.
pub fn verify_index(
    store: &IndexStore,
    layout: &ArtifactLayout,
    kinds: &[ComponentKind],
) -> std::io::Result<Vec<Violation>> {
    let mut violations = Vec::new();

    for &kind in kinds {
        let mut names: BTreeSet<String> = store.entries(kind).keys().cloned().collect();
        let kind_dir = layout.root().join(kind.dir_name());
        if kind_dir.is_dir() {
            for entry in std::fs::read_dir(&kind_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    names.insert(entry.file_name().to_string_lossy().to_string());
                }
            }
        }

        for name in names {
            for branch in Branch::ALL {
                let mut push = |problem| {
                    violations.push(Violation {
                        kind,
                        name: name.clone(),
                        branch,
                        problem,
                    })
                };

                let record = store.get(kind, &name, branch);
                if let Some(record) = record
                    && branch == Branch::Main
                    && record.version.is_prerelease()
                {
                    push(Problem::PrereleaseOnMain {
                        version: record.version.clone(),
                    });
                }

                let current = layout.scan_current(kind, &name, branch)?;
                if current.len() > 1 {
                    push(Problem::MultipleCurrent {
                        artifacts: current.iter().map(|a| a.path.clone()).collect(),
                    });
                }

                let Some(record) = record else {
                    continue;
                };

                let expected = match record.metadata.get("file") {
                    Some(file) => layout.root().join(file),
                    None => layout.current_path(kind, &name, &record.version, branch),
                };
                if !expected.exists() {
                    push(Problem::MissingArtifact { path: expected });
                }

                if let [only] = current.as_slice()
                    && only.version != record.version
                {
                    push(Problem::VersionMismatch {
                        recorded: record.version.clone(),
                        on_disk: only.version.clone(),
                    });
                }
            }
        }
    }

    Ok(violations)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArchiveFormat;
    use crate::store::BranchRecord;
    use std::fs;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn touch(layout: &ArtifactLayout, kind: ComponentKind, name: &str, file: &str) {
        let dir = layout.component_dir(kind, name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), b"artifact").unwrap();
    }

    #[test]
    fn test_consistent_index() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path(), ArchiveFormat::Zip);
        let kind = ComponentKind::Integration;

        touch(&layout, kind, "foo", "foo-1.0.0.zip");
        touch(&layout, kind, "foo", "foo-1.1.0_dev.zip");
        let mut store = IndexStore::default();
        store.set(kind, "foo", Branch::Main, BranchRecord::new(v("1.0.0")));
        store.set(kind, "foo", Branch::Dev, BranchRecord::new(v("1.1.0")));

        let violations = verify_index(&store, &layout, &ComponentKind::ALL).unwrap();
        assert_eq!(violations, vec![]);
    }

    #[test]
    fn test_detects_each_problem() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path(), ArchiveFormat::Zip);
        let kind = ComponentKind::Platform;

        // Two current dev artifacts for an unindexed component.
        touch(&layout, kind, "stray", "stray-1.0.0_dev.zip");
        touch(&layout, kind, "stray", "stray-1.0.1_dev.zip");

        // Pre-release on main whose artifact is missing.
        let mut store = IndexStore::default();
        store.set(kind, "beta", Branch::Main, BranchRecord::new(v("2.0.0a1")));

        // Recorded 1.0.0 but 1.2.0 is on disk.
        touch(&layout, kind, "old", "old-1.2.0.zip");
        store.set(kind, "old", Branch::Main, BranchRecord::new(v("1.0.0")));

        let violations = verify_index(&store, &layout, &[kind]).unwrap();
        let codes: Vec<(&str, &str)> = violations
            .iter()
            .map(|v| (v.name.as_str(), v.problem.code()))
            .collect();

        assert_eq!(
            codes,
            vec![
                ("beta", "prerelease-on-main"),
                ("beta", "missing-artifact"),
                ("old", "missing-artifact"),
                ("old", "version-mismatch"),
                ("stray", "ambiguous-artifacts"),
            ]
        );
    }

    #[test]
    fn test_recorded_file_is_checked() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path(), ArchiveFormat::Zip);
        let kind = ComponentKind::Integration;

        let mut record = BranchRecord::new(v("1.0.0"));
        record
            .metadata
            .insert("file".to_string(), "integrations/foo/elsewhere.zip".to_string());
        let mut store = IndexStore::default();
        store.set(kind, "foo", Branch::Main, record);
        touch(&layout, kind, "foo", "foo-1.0.0.zip");

        let violations = verify_index(&store, &layout, &[kind]).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].problem,
            Problem::MissingArtifact {
                path: dir.path().join("integrations/foo/elsewhere.zip")
            }
        );
    }
}
