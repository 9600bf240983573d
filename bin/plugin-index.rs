//! `plugin-index` is the primary CLI binary.

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use plugin_index::handlers::{self, VERIFY_FAILED_EXIT_CODE};
use plugin_index::{Cli, Command, IndexError, IndexerConfig};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}

/// Print a fatal error, with details for the error types that carry them.
fn print_error(e: &anyhow::Error) {
    println!();
    match e.downcast_ref::<IndexError>() {
        Some(IndexError::InvalidIndex { path, source }) => {
            println!("  {} Invalid index file", "error".bright_red().bold());
            println!();
            println!("    {}: {}", "Path".dimmed(), path.display());
            println!("    {}: {}", "Reason".dimmed(), source);
            println!();
            println!(
                "    {}: Fix or remove the file; a missing index is rebuilt from scratch",
                "hint".bright_blue().bold()
            );
        }
        Some(IndexError::ConfigParse(err)) => {
            println!("  {} Invalid configuration", "error".bright_red().bold());
            println!();
            for line in err.to_string().lines() {
                println!("    {}", line);
            }
        }
        _ => {
            println!("  {} {}", "error".bright_red().bold(), e);
            for cause in e.chain().skip(1) {
                println!("    {} {}", "caused by:".dimmed(), cause);
            }
        }
    }
    println!();
}

/// Initialize tracing.
///
/// `RUST_LOG` wins when set. Otherwise the level follows the verbosity flags:
/// warn by default, info with `-v`, debug with `-vv`, errors only with `-q`.
fn init_tracing(verbose: u8, quiet: bool) {
    let rust_log_set = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .is_some();

    let env_filter = if rust_log_set {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    } else {
        let level = match (quiet, verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, _) => "debug",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Run the selected command, returning the process exit code.
fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = IndexerConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Command::Run(args) => {
            let status = handlers::index_run(config, args, cli.quiet)?;
            Ok(status.exit_code())
        }
        Command::Status { json, kind } => {
            handlers::index_status(&config, json, kind)?;
            Ok(0)
        }
        Command::Verify { kind } => {
            let violations = handlers::index_verify(&config, kind, cli.quiet)?;
            Ok(if violations == 0 {
                0
            } else {
                VERIFY_FAILED_EXIT_CODE
            })
        }
    }
}
