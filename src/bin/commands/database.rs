use clap::Args;
use eventdb::{
    format_size, DatabasePool, EventdbConfig, OutputFormat, SchemaInit, SchemaStatus, SchemaVersion,
};
use serde::Serialize;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{open_database, print_json};

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Also report row counts when the schema is initialized
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct DatabaseStatus {
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    /// `None` when there is no database file to connect to
    connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<SchemaStatus>,
    application_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<eventdb::Statistics>,
}

#[derive(Debug, Serialize)]
struct InitResult {
    path: String,
    created: bool,
    schema_version: String,
    needs_migration: bool,
}

#[derive(Tabled)]
struct TableCountRow {
    table: String,
    rows: u64,
}

/// Report connectivity and schema state; never creates tables
pub fn run_status(config: &EventdbConfig, args: StatusArgs, output_format: OutputFormat) {
    let status = collect_status(config, args.verbose);

    if output_format.is_json() {
        print_json(&status, output_format);
        return;
    }

    println!("Database: {}", status.path);
    println!(
        "  Status:         {}",
        if status.exists { "exists" } else { "not created" }
    );
    if let Some(size) = status.size_bytes {
        println!("  Size:           {}", format_size(size));
    }
    println!(
        "  Connection:     {}",
        match status.connected {
            Some(true) => "ok",
            Some(false) => "failed",
            None => "skipped (database not created)",
        }
    );
    println!("  Schema:         {}", describe_schema(status.schema.as_ref()));
    println!("  Application:    v{}", status.application_version);

    if let Some(stats) = &status.statistics {
        println!();
        print_counts(stats, output_format);
    }

    if status.connected == Some(false) && !config.debug {
        eprintln!();
        eprintln!("Run with --debug for connection error details");
    }
}

/// Gather the status report
///
/// A database file that does not exist yet is left alone: opening it would
/// create it.
fn collect_status(config: &EventdbConfig, verbose: bool) -> DatabaseStatus {
    let db_config = config.database();
    let path = db_config.path.clone();
    let exists = Path::new(&path).exists();

    let mut status = DatabaseStatus {
        size_bytes: None,
        connected: None,
        schema: None,
        application_version: SchemaVersion::application().to_string(),
        statistics: None,
        exists,
        path,
    };
    if !exists {
        return status;
    }

    status.size_bytes = std::fs::metadata(&status.path).ok().map(|m| m.len());

    let pool = DatabasePool::new(&db_config);
    let db = pool.manager();
    let connected = db.test_connection();
    status.connected = Some(connected);
    if !connected {
        return status;
    }

    status.schema = match db.schema().check_status() {
        Ok(schema) => Some(schema),
        Err(e) => {
            eprintln!("Failed to check schema status: {}", e);
            None
        }
    };

    status.statistics = match &status.schema {
        Some(schema) if verbose && *schema != SchemaStatus::NotInitialized => {
            db.statistics().ok()
        }
        _ => None,
    };

    status
}

/// Bootstrap the database, creating the schema on first run
pub fn run_init(config: &EventdbConfig, output_format: OutputFormat) {
    let bootstrapped = open_database(config);
    let db = bootstrapped.pool.manager();

    let result = InitResult {
        path: bootstrapped.pool.config().path.clone(),
        created: bootstrapped.schema_init == SchemaInit::Created,
        schema_version: db.schema_version().to_string(),
        needs_migration: bootstrapped.needs_migration,
    };

    if output_format.is_json() {
        print_json(&result, output_format);
        return;
    }

    if result.created {
        println!("Database initialized at {}", result.path);
    } else {
        println!("Database at {} is already initialized", result.path);
    }
    println!("Schema version: v{}", result.schema_version);
    if result.needs_migration {
        println!(
            "Schema is older than the application (v{}); a migration is required",
            SchemaVersion::application()
        );
    }
}

pub fn run_stats(config: &EventdbConfig, output_format: OutputFormat) {
    let bootstrapped = open_database(config);
    let db = bootstrapped.pool.manager();

    let stats = match db.statistics() {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Failed to collect statistics: {}", e);
            std::process::exit(1);
        }
    };

    if output_format.is_json() {
        print_json(&stats, output_format);
    } else {
        print_counts(&stats, output_format);
    }
}

fn print_counts(stats: &eventdb::Statistics, output_format: OutputFormat) {
    let rows: Vec<TableCountRow> = stats
        .tables
        .iter()
        .map(|(table, rows)| TableCountRow {
            table: table.clone(),
            rows: *rows,
        })
        .collect();

    match output_format {
        OutputFormat::Psv => {
            println!("table|rows");
            for row in &rows {
                println!("{}|{}", row.table, row.rows);
            }
            println!("size_mb|{:.2}", stats.size_mb);
        }
        OutputFormat::Markdown => {
            println!("{}", Table::new(&rows).with(Style::markdown()));
            println!("\nSize: {:.2} MB", stats.size_mb);
        }
        _ => {
            println!("{}", Table::new(&rows).with(Style::rounded()));
            println!("Size: {:.2} MB", stats.size_mb);
        }
    }
}

fn describe_schema(status: Option<&SchemaStatus>) -> String {
    match status {
        None => "unknown".to_string(),
        Some(SchemaStatus::NotInitialized) => "not initialized".to_string(),
        Some(SchemaStatus::Current { version }) => format!("current (v{})", version),
        Some(SchemaStatus::NeedsMigration { from, to }) => {
            format!("needs migration (v{} -> v{})", from, to)
        }
        Some(SchemaStatus::Newer {
            database,
            application,
        }) => format!(
            "newer than application (database v{}, application v{})",
            database, application
        ),
    }
}
