mod commands;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use ums_config::{AppConfig, ConfigLoader, LogFormat};

use crate::commands::Workspace;

#[derive(Parser)]
#[command(name = "ums-migrate", version)]
#[command(about = "Schema migrations for the UMS Core database")]
struct Cli {
    /// Config file (YAML or TOML). Defaults to ~/.config/ums/config.yml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides database.path
    #[arg(long, global = true, env = "CORE_BOT_DB")]
    database: Option<PathBuf>,

    /// Log output format, overrides logging.format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    /// Print reports as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    Up {
        /// Stop after this ordinal
        #[arg(long)]
        to: Option<u32>,
    },
    /// Show every catalog entry and whether it is applied
    Status,
    /// List pending migrations without touching the database
    Plan,
    /// Undo one applied migration and remove its record
    Rollback {
        #[arg(long, required_unless_present = "latest", conflicts_with = "latest")]
        ordinal: Option<u32>,

        /// Roll back the highest applied ordinal
        #[arg(long)]
        latest: bool,
    },
    /// Check that the expected tables exist
    Verify,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = resolve_config(&cli)?;
    init_tracing(&config, cli.verbose);

    let workspace = match cli.command {
        Commands::Up { .. } | Commands::Rollback { .. } => Workspace::open(config)?,
        Commands::Status | Commands::Plan | Commands::Verify => Workspace::open_existing(config)?,
    };
    match cli.command {
        Commands::Up { to } => commands::up(&workspace, to, cli.json),
        Commands::Status => commands::status(&workspace, cli.json),
        Commands::Plan => commands::plan(&workspace, cli.json),
        Commands::Rollback { ordinal, latest } => {
            let target = if latest { None } else { ordinal };
            commands::rollback(&workspace, target, cli.json)
        }
        Commands::Verify => commands::verify(&workspace, cli.json),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config =
        ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    ConfigLoader::validate(&config).context("invalid configuration")?;
    Ok(config)
}

fn init_tracing(config: &AppConfig, verbose: u8) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.with_target(false).init(),
    }
}
