//! depshub - Multi-ecosystem dependency linter CLI tool
//!
//! Finds every manifest and lockfile under a directory, checks the declared
//! dependencies against the configured rules and proposes updates:
//! - npm (package.json, package-lock.json)
//! - Cargo (Cargo.toml, Cargo.lock)
//! - Python (requirements.txt, pyproject.toml)
//! - Bundler, Mix, Maven and Go modules

use clap::Parser;
use depshub::analysis::Analyzer;
use depshub::cancel::CancelSignal;
use depshub::cli::{exit_code, CliArgs, EXIT_FATAL};
use depshub::output::{create_formatter, OutputConfig};
use depshub::registry::{CachedLookup, RegistryClient, RegistryLookup, StaticLookup};
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "depshub=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    let config = args.apply(args.load_config()?);
    if let Some(source) = &config.source {
        debug!(path = %source.display(), "loaded configuration");
    }

    let lookup: Arc<dyn RegistryLookup> = if args.offline {
        Arc::new(StaticLookup::new())
    } else {
        Arc::new(CachedLookup::new(RegistryClient::new()?))
    };

    let cancel = CancelSignal::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let show_progress = !args.json && !args.quiet && io::stderr().is_terminal();
    let analyzer = Analyzer::new(config)
        .with_root(args.root_dir())
        .with_progress(show_progress);
    let report = analyzer.analyze_path(&args.path, lookup, &cancel).await;
    interrupt.abort();
    let report = report?;

    let output_config = OutputConfig::from_cli(args.json, args.verbose, args.quiet)
        .with_color(io::stdout().is_terminal());
    let formatter = create_formatter(output_config);

    let mut stdout = io::stdout().lock();
    formatter.format(&report, &mut stdout)?;
    stdout.flush()?;

    Ok(ExitCode::from(exit_code(report.exit)))
}
