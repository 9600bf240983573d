//! Index sessions.
//!
//! A session runs the reconciler and archive manager over every component of
//! one kind for one branch. Component failures are collected, never
//! propagated early: every component is attempted and the failures are
//! raised together at the end as an [`IndexingError`].

use crate::archive::ArchiveManager;
use crate::artifact::ArtifactLayout;
use crate::component::{Branch, ComponentKind, DiscoveredComponent};
use crate::error::{ComponentError, IndexingError};
use crate::pack::ArtifactBuilder;
use crate::reconcile::{Disposal, DisposalKind, Plan, PublishPlan, Reconciler};
use crate::store::{BranchRecord, IndexStore};
use crate::version::Version;
use std::collections::BTreeMap;
use std::path::PathBuf;


//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Options shared by every session of a run.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Branch being published.
    pub branch: Branch,

    /// Plan only: no filesystem effects, no index mutation.
    pub dry_run: bool,

    /// Rebuild skipped components whose current artifact is missing.
    pub rebuild_missing: bool,
}

/// What happened to one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentOutcome {
    /// Version already published.
    Skipped {
        version: Version,
        artifact_missing: bool,
    },

    /// A new artifact was built and recorded.
    Published {
        version: Version,
        previous: Option<Version>,
        disposal: Option<DisposalKind>,
        file: String,
    },

    /// Dry run: the plan that would have been executed.
    Planned {
        previous: Option<Version>,
        plan: PublishPlan,
    },
}

/// Outcomes of the components a session did not fail on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub kind: ComponentKind,
    pub branch: Branch,
    pub outcomes: BTreeMap<String, ComponentOutcome>,

    /// Files created, moved or removed, for publishing.
    pub touched: Vec<PathBuf>,
}

/// Reconciles all components of a kind against the index.
pub struct IndexSession<'a, B: ArtifactBuilder> {
    layout: &'a ArtifactLayout,
    builder: &'a B,
    options: SessionOptions,
    excludes: BTreeMap<ComponentKind, Vec<String>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SessionReport {
    pub fn new(kind: ComponentKind, branch: Branch) -> Self {
        Self {
            kind,
            branch,
            outcomes: BTreeMap::new(),
            touched: Vec::new(),
        }
    }

    /// Number of components published (or planned, in a dry run).
    pub fn published_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| !matches!(o, ComponentOutcome::Skipped { .. }))
            .count()
    }

    /// Whether the session changed anything on disk.
    pub fn has_changes(&self) -> bool {
        !self.touched.is_empty()
    }
}

impl<'a, B: ArtifactBuilder> IndexSession<'a, B> {
    pub fn new(layout: &'a ArtifactLayout, builder: &'a B, options: SessionOptions) -> Self {
        Self {
            layout,
            builder,
            options,
            excludes: BTreeMap::new(),
        }
    }

    /// Paths left out of artifacts of `kind`.
    pub fn with_excludes(mut self, kind: ComponentKind, excludes: Vec<String>) -> Self {
        self.excludes.insert(kind, excludes);
        self
    }

    /// Reconcile every component of `kind`, updating `store` in place.
    ///
    /// The store entry of a component changes only after its artifact has
    /// been built. Returns the report, or every component error together with
    /// the report of the components that succeeded.
    pub fn run(
        &self,
        store: &mut IndexStore,
        kind: ComponentKind,
        components: Vec<DiscoveredComponent>,
    ) -> Result<SessionReport, IndexingError> {
        let branch = self.options.branch;
        let reconciler =
            Reconciler::new(self.layout, branch).rebuild_missing(self.options.rebuild_missing);
        let manager = ArchiveManager::new(self.builder);

        let mut report = SessionReport::new(kind, branch);
        let mut errors = BTreeMap::new();

        tracing::info!(
            "Indexing {} {} on {}",
            components.len(),
            kind.dir_name(),
            branch
        );

        for component in components {
            let name = component.name.clone();
            match self.process(store, kind, &reconciler, &manager, component, &mut report) {
                Ok(outcome) => {
                    report.outcomes.insert(name, outcome);
                }
                Err(e) => {
                    if e.is_rejection() {
                        tracing::warn!("Rejected {} {}: {}", kind, name, e);
                    } else {
                        tracing::error!("Failed {} {}: {}", kind, name, e);
                    }
                    errors.insert(name, e);
                }
            }
        }

        if errors.is_empty() {
            Ok(report)
        } else {
            Err(IndexingError {
                kind,
                errors,
                report,
            })
        }
    }

    fn process(
        &self,
        store: &mut IndexStore,
        kind: ComponentKind,
        reconciler: &Reconciler<'_>,
        manager: &ArchiveManager<'_, B>,
        component: DiscoveredComponent,
        report: &mut SessionReport,
    ) -> Result<ComponentOutcome, ComponentError> {
        let descriptor = component.descriptor?;
        let branch = self.options.branch;
        let previous = store
            .get(kind, &descriptor.name, branch)
            .map(|r| r.version.clone());
        let record = store.get(kind, &descriptor.name, branch);

        let plan = reconciler.plan(kind, &descriptor, record)?;
        tracing::debug!("{} {}: {}", kind, descriptor.name, plan.label());

        let plan = match plan {
            Plan::Skip {
                version,
                artifact_missing,
            } => {
                if artifact_missing {
                    tracing::warn!(
                        "{} {} {} is recorded but its artifact is missing",
                        kind,
                        descriptor.name,
                        version
                    );
                }
                return Ok(ComponentOutcome::Skipped {
                    version,
                    artifact_missing,
                });
            }
            Plan::Reject(rejection) => return Err(rejection.into()),
            Plan::Publish(plan) => plan,
        };

        if self.options.dry_run {
            return Ok(ComponentOutcome::Planned { previous, plan });
        }

        let excludes = self.excludes.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
        let metadata = manager.execute(&component.dir, &plan, excludes)?;

        let file = self.layout.relative(&plan.target);
        store.set(
            kind,
            &descriptor.name,
            branch,
            BranchRecord {
                version: plan.version.clone(),
                metadata: metadata.to_record_metadata(&file),
            },
        );

        let disposal = plan.disposal.as_ref().map(|d| match d {
            Disposal::Archive { from, to } => {
                report.touched.push(from.clone());
                report.touched.push(to.clone());
                DisposalKind::Archive
            }
            Disposal::Delete { path } => {
                report.touched.push(path.clone());
                DisposalKind::Delete
            }
        });
        report.touched.push(plan.target.clone());

        tracing::info!(
            "Published {} {} {} on {}",
            kind,
            descriptor.name,
            plan.version,
            branch
        );

        Ok(ComponentOutcome::Published {
            version: plan.version,
            previous,
            disposal,
            file,
        })
    }
}
