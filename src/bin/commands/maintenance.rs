use chrono::Utc;
use clap::Args;
use eventdb::{EventdbConfig, Maintenance, OutputFormat};
use std::time::Duration;

use super::{open_database, print_json};

/// Arguments for the Maintenance command
#[derive(Args)]
pub struct MaintenanceArgs {
    /// Override the login attempt retention, in seconds
    #[clap(long, value_name = "SECS")]
    pub retention: Option<u64>,
}

pub fn run(config: &EventdbConfig, args: MaintenanceArgs, output_format: OutputFormat) {
    let bootstrapped = open_database(config);
    let db = bootstrapped.pool.manager();

    let maintenance = match args.retention {
        Some(secs) => Maintenance::new(&db, Duration::from_secs(secs)),
        None => Maintenance::from_config(&db, config),
    };

    let report = match maintenance.run(Utc::now()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Maintenance failed: {}", e);
            std::process::exit(1);
        }
    };

    if output_format.is_json() {
        print_json(&report, output_format);
    } else {
        println!("Removed {} login attempt(s)", report.login_attempts_removed);
        println!("Removed {} expired session(s)", report.sessions_removed);
    }
}
