pub mod config;
pub mod database;
pub mod maintenance;
pub mod query;

use eventdb::{bootstrap, fatal_message, log_failure, Bootstrapped, EventdbConfig, OutputFormat};
use serde::Serialize;

/// Bootstrap the database or terminate the process
///
/// Without a working connection no command can do anything useful, so the
/// failure is reported once and the process exits with status 1.
pub(crate) fn open_database(config: &EventdbConfig) -> Bootstrapped {
    match bootstrap(config) {
        Ok(bootstrapped) => bootstrapped,
        Err(e) => {
            log_failure(&e, config.debug);
            eprintln!("{}", fatal_message(&e, config.debug));
            std::process::exit(1);
        }
    }
}

/// Print a serializable value in one of the JSON formats
pub(crate) fn print_json<T: Serialize>(value: &T, format: OutputFormat) {
    match format.to_json(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}
