//! Vectune - closed-loop index tuner for pgvector-backed vector stores
//!
//! This is the command line entry point.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info};

use vectune::admin::{self, DEFAULT_CLEAN_SCOPES};
use vectune::bench::{self, DEFAULT_BENCH_SCOPE};
use vectune::bootstrap::{self, ConfigSource, DEFAULT_CONFIG_FILE};
use vectune::config::LogFormat;
use vectune::report::{self, OutputFormat};
use vectune::{Config, TuneError};

/// Vectune - observe, reason, act and verify on vector index performance
#[derive(Parser, Debug)]
#[command(name = "vectune")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (TOML)
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        env = "VECTUNE_CONFIG",
        global = true
    )]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides config file)
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        env = "VECTUNE_LOG_LEVEL",
        global = true
    )]
    log_level: Option<String>,

    /// Config overrides in key=value format (can be specified multiple times)
    #[arg(long = "set", value_name = "KEY=VALUE", action = ArgAction::Append, global = true)]
    config_overrides: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one optimization cycle
    Cycle {
        /// Query text to observe
        #[arg(short = 'q', long = "query")]
        query: String,

        /// Index scope (tenant or dataset id)
        #[arg(short = 's', long = "scope", default_value = "default")]
        scope: String,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the benchmark queries, one cycle each
    Bench {
        /// Index scope (tenant or dataset id)
        #[arg(short = 's', long = "scope", default_value = DEFAULT_BENCH_SCOPE)]
        scope: String,

        /// File with one query per line (built-in queries if not set)
        #[arg(long = "queries", value_name = "FILE")]
        queries: Option<PathBuf>,

        /// Pause between queries in milliseconds
        #[arg(long = "pause-ms", default_value = "2000")]
        pause_ms: u64,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// File to write results to (stdout if not set)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Drop the managed indexes of the given scopes and clear the registry
    Clean {
        /// Scope to clean (can be specified multiple times)
        #[arg(short = 's', long = "scope", action = ArgAction::Append)]
        scopes: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show registered indexes, action success rates and query timings
    Summary {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(short = 'o', long = "output", default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite existing configuration file
        #[arg(short = 'f', long = "force", action = ArgAction::SetTrue)]
        force: bool,
    },
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("{} {}", "✗".red(), message);
    ExitCode::FAILURE
}

fn init_logging(config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // Reports go to stdout, logs to stderr.
    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Load, override and validate the configuration, then install logging.
fn setup(cli: &Cli) -> Result<(Config, ConfigSource), TuneError> {
    let (mut config, source) = bootstrap::load_config(cli.config.as_deref())?;
    bootstrap::apply_overrides(&mut config, cli.log_level.as_deref(), &cli.config_overrides)?;
    init_logging(&config);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %source.label(),
        storage = ?config.storage.backend,
        "Starting Vectune"
    );
    Ok((config, source))
}

fn emit(rendered: &str, output: Option<&Path>) -> ExitCode {
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, rendered) {
                return fail(format!("Failed to write output: {e}"));
            }
            eprintln!("{} Results written to {}", "✓".green(), path.display());
        }
        None => println!("{rendered}"),
    }
    ExitCode::SUCCESS
}

async fn cmd_cycle(cli: &Cli, query: &str, scope: &str, format: OutputFormat) -> ExitCode {
    let config = match setup(cli) {
        Ok((config, _)) => config,
        Err(e) => return fail(e),
    };
    let orchestrator = match bootstrap::build_orchestrator(&config).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => return fail(e),
    };

    match orchestrator.run_cycle(query, scope).await {
        Ok(result) => emit(&report::render_cycle(&result, format), None),
        Err(e) => {
            error!(error = %e, "Cycle failed");
            fail(e)
        }
    }
}

async fn cmd_bench(
    cli: &Cli,
    scope: &str,
    queries: Option<&Path>,
    pause_ms: u64,
    format: OutputFormat,
    output: Option<&Path>,
) -> ExitCode {
    let config = match setup(cli) {
        Ok((config, _)) => config,
        Err(e) => return fail(e),
    };
    let queries = match queries {
        Some(path) => match bench::load_queries(path) {
            Ok(queries) => queries,
            Err(e) => return fail(e),
        },
        None => bench::default_queries(),
    };
    let orchestrator = match bootstrap::build_orchestrator(&config).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => return fail(e),
    };

    eprintln!(
        "{} Running {} queries against scope {}...",
        "▶".cyan(),
        queries.len(),
        scope.bold()
    );

    match bench::run(&orchestrator, &queries, scope, Duration::from_millis(pause_ms)).await {
        Ok(report) => emit(&report::render_bench(&report, format), output),
        Err(e) => {
            error!(error = %e, "Benchmark failed");
            fail(e)
        }
    }
}

async fn cmd_clean(cli: &Cli, scopes: &[String], format: OutputFormat) -> ExitCode {
    let config = match setup(cli) {
        Ok((config, _)) => config,
        Err(e) => return fail(e),
    };
    let storage = match bootstrap::connect_storage(&config).await {
        Ok(storage) => storage,
        Err(e) => return fail(e),
    };

    let scopes: Vec<String> = if scopes.is_empty() {
        DEFAULT_CLEAN_SCOPES.iter().map(|s| s.to_string()).collect()
    } else {
        scopes.to_vec()
    };

    match admin::clean_indexes(
        storage.as_ref(),
        &scopes,
        config.controller.storage_timeout(),
    )
    .await
    {
        Ok(report) => emit(&report::render_clean(&report, format), None),
        Err(e) => fail(e),
    }
}

async fn cmd_summary(cli: &Cli, format: OutputFormat) -> ExitCode {
    let config = match setup(cli) {
        Ok((config, _)) => config,
        Err(e) => return fail(e),
    };
    let storage = match bootstrap::connect_storage(&config).await {
        Ok(storage) => storage,
        Err(e) => return fail(e),
    };

    match admin::collect_summary(storage.as_ref(), config.controller.storage_timeout()).await {
        Ok(summary) => emit(&report::render_summary(&summary, format), None),
        Err(e) => fail(e),
    }
}

fn cmd_init(output: &Path, force: bool) -> ExitCode {
    if output.exists() && !force {
        return fail(format!(
            "Configuration file '{}' already exists. Use --force to overwrite it.",
            output.display()
        ));
    }

    if let Err(e) = Config::default().to_file(output) {
        return fail(e);
    }

    println!("Created configuration file: {}", output.display());
    println!();
    println!("To run one cycle against the simulated store:");
    println!(
        "  vectune --config {} cycle --query \"vector search\"",
        output.display()
    );
    println!();
    println!("Set storage.backend = \"postgres\" to tune a live database.");
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Cycle {
            query,
            scope,
            format,
        } => cmd_cycle(&cli, query, scope, *format).await,

        Commands::Bench {
            scope,
            queries,
            pause_ms,
            format,
            output,
        } => {
            cmd_bench(
                &cli,
                scope,
                queries.as_deref(),
                *pause_ms,
                *format,
                output.as_deref(),
            )
            .await
        }

        Commands::Clean { scopes, format } => cmd_clean(&cli, scopes, *format).await,

        Commands::Summary { format } => cmd_summary(&cli, *format).await,

        Commands::Init { output, force } => cmd_init(output, *force),
    }
}
