//! `plugin-index run` handler.

use super::common::{format_size, plural, print_component_errors};
use crate::commands::{KindArg, RunArgs};
use crate::component::{Branch, ComponentKind, discover_components};
use crate::config::IndexerConfig;
use crate::error::{IndexError, IndexResult, IndexingError};
use crate::pack::PackBuilder;
use crate::publish::{GitPublisher, PublishStatus, Publisher};
use crate::reconcile::{Disposal, DisposalKind};
use crate::session::{ComponentOutcome, IndexSession, SessionOptions, SessionReport};
use crate::store::IndexStore;
use crate::version::Version;
use chrono::Utc;
use colored::Colorize;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Which kinds had failing components. Maps onto the process exit code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatus {
    pub integrations_failed: bool,
    pub platforms_failed: bool,
}

/// Everything a reconciliation run did.
#[derive(Debug)]
pub struct RunSummary {
    pub branch: Branch,
    pub dry_run: bool,

    /// One result per kind, in processing order.
    pub sessions: Vec<Result<SessionReport, IndexingError>>,

    /// The index file was written.
    pub saved: bool,

    /// Result of publishing, when it ran.
    pub published: Option<PublishStatus>,

    /// Index after the run.
    pub store: IndexStore,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RunStatus {
    /// 0 on success, 2 when integrations failed, 3 for platforms, 4 for both.
    pub fn exit_code(&self) -> i32 {
        match (self.integrations_failed, self.platforms_failed) {
            (false, false) => 0,
            (true, false) => 2,
            (false, true) => 3,
            (true, true) => 4,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

impl RunSummary {
    pub fn status(&self) -> RunStatus {
        let failed = |kind: ComponentKind| {
            self.sessions
                .iter()
                .any(|s| matches!(s, Err(e) if e.kind == kind))
        };

        RunStatus {
            integrations_failed: failed(ComponentKind::Integration),
            platforms_failed: failed(ComponentKind::Platform),
        }
    }

    fn reports(&self) -> impl Iterator<Item = &SessionReport> {
        self.sessions.iter().map(|s| match s {
            Ok(report) => report,
            Err(e) => &e.report,
        })
    }

    /// Whether any session changed files on disk.
    pub fn has_changes(&self) -> bool {
        self.reports().any(SessionReport::has_changes)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Run a reconciliation pass from the command line.
pub fn index_run(mut config: IndexerConfig, args: RunArgs, quiet: bool) -> IndexResult<RunStatus> {
    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(output) = args.output {
        config.output = output;
    }

    let options = SessionOptions {
        branch: if args.dev { Branch::Dev } else { Branch::Main },
        dry_run: args.dry_run,
        rebuild_missing: config.rebuild_missing,
    };

    let git = (args.publish || config.publish.enabled).then(|| GitPublisher {
        repo: config.publish_repo(),
        push: config.publish.push,
        remote: config.publish.remote.clone(),
    });

    let kinds = KindArg::select(args.kind);
    let summary = reconcile_index(
        &config,
        &kinds,
        options,
        git.as_ref().map(|g| g as &dyn Publisher),
    )?;

    print_summary(&summary, quiet);
    Ok(summary.status())
}

/// Reconcile every selected kind, then save and optionally publish the index.
///
/// Component failures do not make this fail: they are reported in the
/// summary and the progress of every other component is still saved. The
/// index is only stamped and rewritten when a session changed something, so a
/// repeated run leaves it untouched.
pub fn reconcile_index(
    config: &IndexerConfig,
    kinds: &[ComponentKind],
    options: SessionOptions,
    publisher: Option<&dyn Publisher>,
) -> IndexResult<RunSummary> {
    if !config.source.is_dir() {
        return Err(IndexError::InvalidConfig(format!(
            "source folder not found: {}",
            config.source.display()
        )));
    }
    config.check_paths()?;

    let index_path = config.index_path();
    let layout = config.layout();
    let builder = PackBuilder {
        format: config.format,
    };

    let mut store = IndexStore::load(&index_path)?;
    let session = kinds.iter().fold(
        IndexSession::new(&layout, &builder, options),
        |session, &kind| session.with_excludes(kind, config.excludes_for(kind).to_vec()),
    );

    let mut sessions = Vec::new();
    for &kind in kinds {
        let components = discover_components(kind, &config.source)?;
        sessions.push(session.run(&mut store, kind, components));
    }

    let mut summary = RunSummary {
        branch: options.branch,
        dry_run: options.dry_run,
        sessions,
        saved: false,
        published: None,
        store,
    };

    if options.dry_run {
        return Ok(summary);
    }

    let changed = summary.has_changes();
    if changed {
        summary
            .store
            .stamp(options.branch, Utc::now(), &config.tool_versions);
    }
    if changed || !index_path.exists() {
        summary.store.save(&index_path)?;
        summary.saved = true;
    }

    if let Some(publisher) = publisher
        && changed
    {
        let mut paths = vec![index_path];
        paths.extend(
            kinds
                .iter()
                .map(|kind| layout.root().join(kind.dir_name()))
                .filter(|p| p.exists()),
        );
        let message = config.commit_message(options.branch);
        summary.published = Some(publisher.publish(&paths, &message)?);
    }

    Ok(summary)
}

fn print_summary(summary: &RunSummary, quiet: bool) {
    for session in &summary.sessions {
        let (report, failure) = match session {
            Ok(report) => (report, None),
            Err(e) => (&e.report, Some(e)),
        };

        if !quiet {
            print_report(report, &summary.store);
        }

        if let Some(failure) = failure {
            print_component_errors(&failure.errors);
            println!(
                "  {} {} failed",
                "✗".bright_red(),
                plural(failure.errors.len(), &failure.kind.to_string())
            );
            println!();
        }
    }

    if quiet {
        return;
    }

    if summary.dry_run {
        println!("  {} Dry run, nothing was written", "•".bright_blue());
    } else if summary.saved {
        println!(
            "  {} Index saved ({} branch)",
            "✓".bright_green(),
            summary.branch
        );
    } else {
        println!("  {} Index up to date", "✓".bright_green());
    }

    match summary.published {
        Some(PublishStatus::Committed { pushed: true }) => {
            println!("  {} Committed and pushed", "✓".bright_green())
        }
        Some(PublishStatus::Committed { pushed: false }) => {
            println!("  {} Committed", "✓".bright_green())
        }
        Some(PublishStatus::NothingToCommit) => {
            println!("  {} Nothing to commit", "•".bright_blue())
        }
        None => {}
    }
}

fn print_report(report: &SessionReport, store: &IndexStore) {
    if report.outcomes.is_empty() {
        return;
    }

    println!(
        "  {} {} on {}",
        report.kind.dir_name().bold(),
        format!("({})", report.outcomes.len()).dimmed(),
        report.branch
    );

    for (name, outcome) in &report.outcomes {
        match outcome {
            ComponentOutcome::Skipped {
                version,
                artifact_missing,
            } => {
                let note = if *artifact_missing {
                    " (artifact missing)".bright_yellow().to_string()
                } else {
                    String::new()
                };
                println!(
                    "    {} {} {}{}",
                    "-".dimmed(),
                    name.dimmed(),
                    version.to_string().dimmed(),
                    note
                );
            }
            ComponentOutcome::Published {
                version,
                previous,
                disposal,
                ..
            } => {
                let size = store
                    .get(report.kind, name, report.branch)
                    .and_then(|r| r.metadata.get("compressed_size"))
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|s| format!(" ({})", format_size(s)))
                    .unwrap_or_default();
                println!(
                    "    {} {} {}{}{}",
                    "✓".bright_green(),
                    name,
                    version.to_string().bright_green(),
                    size.dimmed(),
                    describe_previous(previous.as_ref(), *disposal).dimmed()
                );
            }
            ComponentOutcome::Planned { previous, plan } => {
                let disposal = plan.disposal.as_ref().map(|d| match d {
                    Disposal::Archive { .. } => DisposalKind::Archive,
                    Disposal::Delete { .. } => DisposalKind::Delete,
                });
                println!(
                    "    {} {} {}{}",
                    "+".bright_cyan(),
                    name,
                    plan.version.to_string().bright_cyan(),
                    describe_previous(previous.as_ref(), disposal).dimmed()
                );
            }
        }
    }
    println!();
}

fn describe_previous(
    previous: Option<&Version>,
    disposal: Option<DisposalKind>,
) -> String {
    match (previous, disposal) {
        (Some(prev), Some(DisposalKind::Archive)) => format!(", archived {}", prev),
        (Some(prev), Some(DisposalKind::Delete)) => format!(", replaced {}", prev),
        (Some(prev), None) => format!(", was {}", prev),
        (None, _) => ", new".to_string(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
