#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "affected")]
#[command(author, version, about = "Test-selection engine for change-driven test runs", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory (defaults to the current one)
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run one orchestration pass and print the selection decision
    Run {
        /// Glob patterns identifying test files, comma-separated
        #[arg(long, value_delimiter = ',', default_value = "tests/**/*.test.ts,src/**/*.test.ts")]
        include: Vec<String>,

        /// Glob patterns to exclude from the test universe, comma-separated
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Setup files that always force a full-suite run when touched
        #[arg(long, value_delimiter = ',')]
        setup_file: Vec<PathBuf>,

        /// Diff against this VCS reference instead of just the working tree
        #[arg(long)]
        reference: Option<String>,

        /// Full-suite fallback threshold (affected / universe), 0.0-1.0
        #[arg(long, default_value_t = 1.0)]
        threshold: f64,

        /// Run zero tests (instead of the full suite) when nothing is affected
        #[arg(long)]
        allow_no_tests: bool,

        /// Disable the persistent reverse-dependency cache
        #[arg(long)]
        no_cache: bool,

        /// Append-only JSON-lines journal path
        #[arg(long, value_name = "PATH")]
        stats_file: Option<PathBuf>,

        /// Bypass the VCS change detector with an explicit file list, comma-separated
        #[arg(long, value_delimiter = ',')]
        changed: Vec<PathBuf>,
    },

    /// Report git repository and cache health
    Doctor,

    /// Remove the persisted `.vitest-affected/` cache directory
    ClearCache,

    /// Dump the current reverse dependency map
    ShowGraph,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Run {
            include,
            exclude,
            setup_file,
            reference,
            threshold,
            allow_no_tests,
            no_cache,
            stats_file,
            changed,
        } => {
            let span = tracing::info_span!("run", cwd = %cwd.display());
            let _guard = span.enter();
            commands::run::run(commands::run::RunArgs {
                cwd,
                include,
                exclude,
                setup_file,
                reference,
                threshold,
                allow_no_tests,
                cache: !no_cache,
                stats_file,
                changed,
                json: cli.json,
            })
        }
        Commands::Doctor => commands::doctor::run(&cwd, cli.json),
        Commands::ClearCache => commands::clear_cache::run(&cwd, cli.json),
        Commands::ShowGraph => commands::show_graph::run(&cwd, cli.json),
    }
}
