//! Version reconciliation.
//!
//! Compares a component's declared version against the index record for one
//! branch and decides what the pass should do about it. Decisions are made in
//! two steps: [`decide`] applies the version rules and does no I/O, then
//! [`Reconciler::plan`] inspects the component folder to work out which old
//! artifact (if any) has to be disposed of and how.
//!
//! Version rules, first match wins:
//!
//! 1. No record: the recorded version is `0.0.0`.
//! 2. Recorded equals declared: skip.
//! 3. Recorded is greater than declared: reject, the version regressed.
//! 4. Main branch and declared is a pre-release: reject.
//! 5. Otherwise publish.

use crate::artifact::{ArtifactLayout, CurrentArtifact};
use crate::component::{Branch, ComponentDescriptor, ComponentKind};
use crate::error::ComponentError;
use crate::store::BranchRecord;
use crate::version::Version;
use std::path::PathBuf;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Outcome of the version rules alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Reject(Rejection),
    Publish,
}

/// A policy violation that excludes a component from the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    VersionRegressed { recorded: Version, declared: Version },
    PrereleaseOnMainBranch { declared: Version },
}

/// What to do about one component on one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Already published.
    Skip {
        version: Version,
        /// The current artifact for the version is not on disk.
        artifact_missing: bool,
    },

    /// Excluded from this pass.
    Reject(Rejection),

    /// Build a new current artifact.
    Publish(PublishPlan),
}

/// A planned publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPlan {
    pub version: Version,

    /// Where the new current artifact goes.
    pub target: PathBuf,

    /// How to get rid of the previous current artifact, if there is one.
    pub disposal: Option<Disposal>,
}

/// Disposal of a superseded current artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposal {
    /// Move into the component's `versions/` folder.
    Archive { from: PathBuf, to: PathBuf },

    /// Remove outright.
    Delete { path: PathBuf },
}

/// Which disposal applies, before paths are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposalKind {
    Archive,
    Delete,
}

/// Plans one branch of a pass against an artifact layout.
#[derive(Debug, Clone)]
pub struct Reconciler<'a> {
    layout: &'a ArtifactLayout,
    branch: Branch,
    rebuild_missing: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> Reconciler<'a> {
    pub fn new(layout: &'a ArtifactLayout, branch: Branch) -> Self {
        Self {
            layout,
            branch,
            rebuild_missing: false,
        }
    }

    /// Rebuild a skipped component whose current artifact has gone missing.
    pub fn rebuild_missing(mut self, rebuild_missing: bool) -> Self {
        self.rebuild_missing = rebuild_missing;
        self
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    /// Compute the plan for one component.
    ///
    /// Rejections are normal plans. Errors are reserved for an inconsistent
    /// component folder or an archive collision, and for I/O failures while
    /// inspecting the folder.
    pub fn plan(
        &self,
        kind: ComponentKind,
        descriptor: &ComponentDescriptor,
        record: Option<&BranchRecord>,
    ) -> Result<Plan, ComponentError> {
        let name = descriptor.name.as_str();
        let declared = &descriptor.declared_version;
        let target = self.layout.current_path(kind, name, declared, self.branch);

        match decide(self.branch, record.map(|r| &r.version), declared) {
            Decision::Reject(rejection) => Ok(Plan::Reject(rejection)),
            Decision::Skip => {
                let artifact_missing = !target.exists();
                if artifact_missing && self.rebuild_missing {
                    let current = self.single_current(kind, name)?;
                    if current.as_ref().is_some_and(|c| c.path != target) {
                        // Something other than the recorded version sits in the
                        // folder; rebuilding alongside it would leave two.
                        return Err(self.ambiguous(kind, name, current.into_iter().collect()));
                    }
                    return Ok(Plan::Publish(PublishPlan {
                        version: declared.clone(),
                        target,
                        disposal: None,
                    }));
                }
                Ok(Plan::Skip {
                    version: declared.clone(),
                    artifact_missing,
                })
            }
            Decision::Publish => {
                let disposal = match self.single_current(kind, name)? {
                    // Built by an earlier pass that did not get to save the
                    // index. The new build overwrites it.
                    Some(old) if old.path == target => None,
                    Some(old) => Some(self.disposal_for(kind, name, old)?),
                    None => None,
                };

                Ok(Plan::Publish(PublishPlan {
                    version: declared.clone(),
                    target,
                    disposal,
                }))
            }
        }
    }

    /// The branch's current artifact, failing if there is more than one.
    fn single_current(
        &self,
        kind: ComponentKind,
        name: &str,
    ) -> Result<Option<CurrentArtifact>, ComponentError> {
        let mut found = self.layout.scan_current(kind, name, self.branch)?;
        if found.len() > 1 {
            return Err(self.ambiguous(kind, name, found));
        }
        Ok(found.pop())
    }

    fn ambiguous(
        &self,
        kind: ComponentKind,
        name: &str,
        artifacts: Vec<CurrentArtifact>,
    ) -> ComponentError {
        ComponentError::AmbiguousArtifactState {
            folder: self.layout.component_dir(kind, name),
            artifacts: artifacts.into_iter().map(|a| a.path).collect(),
        }
    }

    fn disposal_for(
        &self,
        kind: ComponentKind,
        name: &str,
        old: CurrentArtifact,
    ) -> Result<Disposal, ComponentError> {
        match disposal_kind(self.branch, &old.version) {
            DisposalKind::Delete => Ok(Disposal::Delete { path: old.path }),
            DisposalKind::Archive => {
                let to = self.layout.archive_path(kind, name, &old.version);
                if to.exists() {
                    return Err(ComponentError::ArchiveCollision { path: to });
                }
                Ok(Disposal::Archive { from: old.path, to })
            }
        }
    }
}

impl Plan {
    /// Short label for logs and terminal output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skip { .. } => "skip",
            Self::Reject(_) => "reject",
            Self::Publish(_) => "publish",
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<Rejection> for ComponentError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::VersionRegressed { recorded, declared } => {
                ComponentError::VersionRegressed { recorded, declared }
            }
            Rejection::PrereleaseOnMainBranch { declared } => {
                ComponentError::PrereleaseOnMainBranch { version: declared }
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Apply the version rules for one branch.
pub fn decide(branch: Branch, recorded: Option<&Version>, declared: &Version) -> Decision {
    let recorded = recorded.unwrap_or(&Version::ZERO);

    if recorded == declared {
        return Decision::Skip;
    }

    if recorded > declared {
        return Decision::Reject(Rejection::VersionRegressed {
            recorded: recorded.clone(),
            declared: declared.clone(),
        });
    }

    if branch == Branch::Main && declared.is_prerelease() {
        return Decision::Reject(Rejection::PrereleaseOnMainBranch {
            declared: declared.clone(),
        });
    }

    Decision::Publish
}

/// How a superseded artifact of `old` is disposed of on `branch`.
///
/// Main-branch artifacts are always archived. On dev, superseded pre-releases
/// are archived while builds of finished release numbers are deleted, since
/// main archives those once they are promoted.
pub fn disposal_kind(branch: Branch, old: &Version) -> DisposalKind {
    match branch {
        Branch::Main => DisposalKind::Archive,
        Branch::Dev if old.is_prerelease() => DisposalKind::Archive,
        Branch::Dev => DisposalKind::Delete,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
