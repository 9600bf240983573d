//! Error types for plugin-index.

use crate::component::ComponentKind;
use crate::pack::PackError;
use crate::publish::PublishError;
use crate::session::SessionReport;
use crate::version::{Version, VersionError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Result type for plugin-index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Error type for whole-run failures.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The index file exists but is not a valid index.
    #[error("Invalid index file {}: {source}", .path.display())]
    InvalidIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Publishing the index failed.
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Error attached to a single component during a reconciliation pass.
///
/// None of these abort the pass; the session collects them per component.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// The declared version could not be parsed.
    #[error("{0}")]
    InvalidVersion(#[from] VersionError),

    /// The declared version is lower than the one already published.
    #[error("version regressed from {recorded} to {declared}")]
    VersionRegressed { recorded: Version, declared: Version },

    /// A pre-release version was declared for the main branch.
    #[error("pre-release version {version} cannot be published on the main branch")]
    PrereleaseOnMainBranch { version: Version },

    /// The archive destination is already taken; archived artifacts are write-once.
    #[error("archive destination already exists: {}", .path.display())]
    ArchiveCollision { path: PathBuf },

    /// The component folder holds more than one current artifact for the branch.
    #[error("{} current artifacts found in {}, expected at most one", .artifacts.len(), .folder.display())]
    AmbiguousArtifactState {
        folder: PathBuf,
        artifacts: Vec<PathBuf>,
    },

    /// The component manifest is missing or unreadable.
    #[error("cannot read descriptor {}: {reason}", .path.display())]
    MissingDescriptor { path: PathBuf, reason: String },

    /// Moving an artifact into the archive failed.
    #[error("failed to archive {} to {}: {source}", .from.display(), .to.display())]
    Archiving {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building the new artifact failed.
    #[error("build failed: {0}")]
    Build(#[from] PackError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregate failure of one index session.
///
/// Raised after every component of a kind has been attempted. Carries the
/// report of the components that did succeed so callers can still persist
/// partial progress.
#[derive(Debug, Error)]
#[error("{} {} failed to index: {}", .errors.len(), .kind.dir_name(), failed_names(.errors))]
pub struct IndexingError {
    /// Kind of component the session processed.
    pub kind: ComponentKind,

    /// Errors keyed by component name.
    pub errors: BTreeMap<String, ComponentError>,

    /// Outcomes of the components that did not fail.
    pub report: SessionReport,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ComponentError {
    /// Short machine-friendly code for terminal and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidVersion(_) => "invalid-version",
            Self::VersionRegressed { .. } => "version-regressed",
            Self::PrereleaseOnMainBranch { .. } => "prerelease-on-main",
            Self::ArchiveCollision { .. } => "archive-collision",
            Self::AmbiguousArtifactState { .. } => "ambiguous-artifacts",
            Self::MissingDescriptor { .. } => "missing-descriptor",
            Self::Archiving { .. } => "archiving",
            Self::Build(_) => "build",
            Self::Io(_) => "io",
        }
    }

    /// Whether the error is a policy rejection rather than a filesystem problem.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::VersionRegressed { .. } | Self::PrereleaseOnMainBranch { .. }
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn failed_names(errors: &BTreeMap<String, ComponentError>) -> String {
    errors.keys().cloned().collect::<Vec<_>>().join(", ")
}
