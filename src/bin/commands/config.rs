use clap::Args;
use eventdb::{EventdbConfig, OutputFormat};
use serde::Serialize;
use std::path::Path;

use super::print_json;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Only print the configuration file path
    #[clap(long)]
    pub path: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    config_file: String,
    config_file_exists: bool,
    #[serde(flatten)]
    settings: &'a EventdbConfig,
}

pub fn run(
    config: &EventdbConfig,
    config_path: Option<&str>,
    args: ConfigArgs,
    output_format: OutputFormat,
) {
    let config_file = config_path
        .map(str::to_string)
        .unwrap_or_else(EventdbConfig::config_file_path);

    if args.path {
        println!("{}", config_file);
        return;
    }

    let info = ConfigInfo {
        config_file_exists: Path::new(&config_file).exists(),
        config_file,
        settings: config,
    };

    if output_format.is_json() {
        print_json(&info, output_format);
        return;
    }

    println!("eventdb Configuration");
    println!("=====================\n");
    println!("Config File:        {}", info.config_file);
    println!("{}", config.summary());

    eprintln!();
    eprintln!("Tips:");
    eprintln!("  Use --format json for machine-readable output");
    eprintln!("  Set EVENTDB_<KEY> environment variables to override settings");
    eprintln!("  Edit {} to customize settings", info.config_file);
}
