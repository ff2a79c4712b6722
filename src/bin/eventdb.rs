use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use eventdb::*;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::config::ConfigArgs;
use commands::database::StatusArgs;
use commands::maintenance::MaintenanceArgs;
use commands::query::QueryArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.eventdb/eventdb.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information, including full database error details
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table (default), markdown, json, json-pretty, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the database and create the schema if it does not exist yet
    Init,

    /// Show connection and schema status without modifying the database
    Status(StatusArgs),

    /// Show table row counts and database size
    Stats,

    /// Run a parameterized SQL statement
    Query(QueryArgs),

    /// Remove expired sessions and old login attempts
    Maintenance(MaintenanceArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

fn init_logging(debug: bool, log_file: Option<&str>) -> Result<()> {
    let default_level = match (debug, log_file) {
        (true, _) => "debug",
        (false, Some(_)) => "info",
        (false, None) => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow!("Unable to open log file {}: {}", path, e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| anyhow!(err))
        }
        None => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| anyhow!(err)),
    }
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match EventdbConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    config.debug |= cli.debug;

    if let Err(e) = init_logging(config.debug, config.log_file.as_deref()) {
        eprintln!("{e}, logging to stderr instead");
        init_logging(config.debug, None).ok();
    }

    let format = cli.format;

    match cli.command {
        Commands::Config(args) => {
            commands::config::run(&config, cli.config.as_deref(), args, format)
        }
        Commands::Status(args) => commands::database::run_status(&config, args, format),
        Commands::Init => commands::database::run_init(&config, format),
        Commands::Stats => commands::database::run_stats(&config, format),
        Commands::Query(args) => commands::query::run(&config, args, format),
        Commands::Maintenance(args) => commands::maintenance::run(&config, args, format),
    }
}
