//! CLI command definitions.

use crate::component::ComponentKind;
use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const RUN_EXAMPLES: &str = "\
Examples:
  plugin-index run                          Publish changed components on main
  plugin-index run --dev                    Publish changed components on dev
  plugin-index run --dry-run                Show what would be published
  plugin-index run --kind platforms         Only index platforms
  plugin-index run --publish                Commit the updated index to git
  plugin-index run --source . --output idx  Override config paths";

const STATUS_EXAMPLES: &str = "\
Examples:
  plugin-index status                       Show every indexed component
  plugin-index status --kind integrations   Show integrations only
  plugin-index status --json                Print the raw index";

const VERIFY_EXAMPLES: &str = "\
Examples:
  plugin-index verify                       Check the index against disk
  plugin-index verify --kind platforms      Check platforms only";

const CLI_EXAMPLES: &str = "\
Examples:
  plugin-index run                          Index and archive on main
  plugin-index run --dev                    Index and archive on dev
  plugin-index status                       Show the package index
  plugin-index verify                       Check artifacts on disk

Config is read from plugin-index.toml, or the file named by --config or
PLUGIN_INDEX_CONFIG.";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Build and track versioned plugin packages.
#[derive(Debug, Parser)]
#[command(name = "plugin-index", author, version, styles = styles())]
#[command(
    about = "Build and track versioned integration and platform packages",
    after_help = CLI_EXAMPLES
)]
pub struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile component versions with the index, then build and archive artifacts.
    #[command(after_help = RUN_EXAMPLES)]
    Run(RunArgs),

    /// Print the package index.
    #[command(after_help = STATUS_EXAMPLES)]
    Status {
        /// Print the index as JSON.
        #[arg(long)]
        json: bool,

        /// Only show one kind of component.
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Check the index and artifact folders for inconsistencies.
    #[command(after_help = VERIFY_EXAMPLES)]
    Verify {
        /// Only check one kind of component.
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },
}

/// Arguments of `plugin-index run`.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Publish on the dev branch instead of main.
    #[arg(long)]
    pub dev: bool,

    /// Plan only: build nothing, move nothing, leave the index untouched.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Only index one kind of component.
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Commit the updated index and artifacts to git.
    #[arg(long)]
    pub publish: bool,

    /// Folder containing `integrations/` and `platforms/`.
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Index root holding the index file and artifact folders.
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

/// Component kind as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Integrations,
    Platforms,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl KindArg {
    /// Kinds selected by an optional `--kind` flag, in processing order.
    pub fn select(kind: Option<KindArg>) -> Vec<ComponentKind> {
        match kind {
            Some(k) => vec![k.into()],
            None => ComponentKind::ALL.to_vec(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<KindArg> for ComponentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Integrations => ComponentKind::Integration,
            KindArg::Platforms => ComponentKind::Platform,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn styles() -> Styles {
    let bold = |color| Style::new().bold().fg_color(Some(Color::Ansi(color)));

    Styles::styled()
        .header(bold(AnsiColor::Yellow))
        .usage(bold(AnsiColor::Green))
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(bold(AnsiColor::Red))
        .invalid(bold(AnsiColor::Red))
        .valid(bold(AnsiColor::Green))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "plugin-index",
            "-vv",
            "run",
            "--dev",
            "--kind",
            "platforms",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dev);
        assert!(args.dry_run);
        assert!(!args.publish);
        assert_eq!(KindArg::select(args.kind), vec![ComponentKind::Platform]);
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["plugin-index", "status", "--config", "x.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["plugin-index", "-q", "-v", "verify"]).is_err());
    }

    #[test]
    fn test_select_all_kinds() {
        assert_eq!(
            KindArg::select(None),
            vec![ComponentKind::Integration, ComponentKind::Platform]
        );
    }
}
