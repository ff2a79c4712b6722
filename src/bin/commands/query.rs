use clap::Args;
use eventdb::utils::render_outcome;
use eventdb::{DbResult, EventdbConfig, OutputFormat, QueryOutcome};
use rusqlite::types::Value;
use rusqlite::ToSql;
use serde_json::json;

use super::{open_database, print_json};

/// Arguments for the Query command
#[derive(Args)]
pub struct QueryArgs {
    /// SQL statement with positional placeholders, e.g. "SELECT * FROM events WHERE id = ?1"
    #[clap(value_name = "SQL")]
    pub sql: String,

    /// Values bound to the placeholders, in order
    #[clap(value_name = "PARAM", allow_negative_numbers = true)]
    pub params: Vec<String>,

    /// Bind every parameter as text instead of inferring integers, reals and NULL
    #[clap(long)]
    pub text: bool,

    /// Run inside a transaction and roll it back afterwards
    #[clap(long)]
    pub dry_run: bool,
}

pub fn run(config: &EventdbConfig, args: QueryArgs, output_format: OutputFormat) {
    let QueryArgs {
        sql,
        params,
        text,
        dry_run,
    } = args;

    let values: Vec<Value> = params
        .iter()
        .map(|p| if text { Value::Text(p.clone()) } else { parse_param(p) })
        .collect();
    let bound: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();

    let bootstrapped = open_database(config);
    let db = bootstrapped.pool.manager();

    let result: DbResult<QueryOutcome> = if dry_run {
        db.begin_transaction().and_then(|tx| {
            let outcome = tx.execute_query(&sql, &bound)?;
            tx.rollback()?;
            Ok(outcome)
        })
    } else {
        db.execute_query(&sql, &bound)
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Query failed: {}", e);
            std::process::exit(1);
        }
    };

    if outcome.columns().is_empty() {
        if output_format.is_json() {
            print_json(
                &json!({"affected_rows": outcome.affected_rows(), "dry_run": dry_run}),
                output_format,
            );
        } else {
            println!(
                "{} row(s) affected{}",
                outcome.affected_rows(),
                if dry_run { " (rolled back)" } else { "" }
            );
        }
        return;
    }

    match render_outcome(&outcome, output_format) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

/// Infer a SQLite value from a command-line argument
fn parse_param(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
        Value::Real(f)
    } else {
        Value::Text(raw.to_string())
    }
}
