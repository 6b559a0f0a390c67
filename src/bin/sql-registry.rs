use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use sql_registry::prelude::*;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and maintain a sql-registry database")]
struct Args {
    /// Database file; falls back to SQL_REGISTRY_DATABASE.
    #[arg(long, global = true)]
    database: Option<String>,
    #[arg(long, global = true)]
    lock_dir: Option<PathBuf>,
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    busy_timeout: Option<Duration>,
    /// Repeat for more detail.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the registry schema and seed the installation id.
    Install,
    /// Run a .sql script as one batch.
    Run {
        script: PathBuf,
        #[arg(long)]
        no_transaction: bool,
    },
    Get {
        name: String,
    },
    /// Print the full row, timestamps included, as JSON.
    Entry {
        name: String,
    },
    /// Store a JSON value; `null` removes the entry.
    Set {
        name: String,
        json: String,
    },
    Unset {
        name: String,
    },
    Incr {
        name: String,
        #[arg(long, default_value_t = 1)]
        start: i64,
    },
    /// Run a query; each argument is parsed as JSON (arrays and objects feed `??` markers)
    /// and taken as a plain string otherwise.
    Query {
        sql: String,
        args: Vec<String>,
    },
    /// Print the installation id.
    Id,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn options(args: &Args) -> Result<SessionOptions, SqlRegistryError> {
    let mut options = match &args.database {
        Some(database) => SessionOptions::new(database.clone()),
        None => SessionOptions::from_env()?,
    };
    if let Some(dir) = &args.lock_dir {
        options.lock_dir = Some(dir.clone());
    }
    if let Some(timeout) = args.busy_timeout {
        options.busy_timeout = timeout;
    }
    Ok(options)
}

fn run(args: Args) -> Result<ExitCode, SqlRegistryError> {
    let session = Session::open(&options(&args)?)?;
    let registry = Registry::new(&session);

    match args.command {
        Command::Install => {
            let id = Installer::new(&session).install_schema()?;
            println!("{id}");
        }
        Command::Run {
            script,
            no_transaction,
        } => {
            let mode = if no_transaction {
                BatchMode::Autocommit
            } else {
                BatchMode::Transaction
            };
            let report = Installer::new(&session).run_script(&script, mode);
            println!("{}", serde_json::to_string(&report)?);
            if !report.ok {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Get { name } => {
            println!("{}", registry.get(&name, JsonValue::Null)?);
        }
        Command::Entry { name } => match registry.entry(&name)? {
            Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            None => return Ok(ExitCode::FAILURE),
        },
        Command::Set { name, json } => {
            let value: JsonValue = serde_json::from_str(&json)?;
            println!("{}", registry.set(&name, value)?);
        }
        Command::Unset { name } => {
            println!("{}", registry.unset(&name)?);
        }
        Command::Incr { name, start } => {
            println!("{}", registry.increment(&name, start)?);
        }
        Command::Query { sql, args } => {
            let args: Vec<Arg> = args.iter().map(|raw| cli_arg(raw)).collect();
            match session.execute(&sql, &args)? {
                ExecutionOutcome::Rows(cursor) => {
                    for row in cursor {
                        println!("{}", row.to_json());
                    }
                }
                ExecutionOutcome::Count(count) => println!("{count}"),
            }
        }
        Command::Id => {
            println!("{}", registry.installation_id()?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cli_arg(raw: &str) -> Arg {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Array(items)) => Arg::List(items.into_iter().map(Param::Json).collect()),
        Ok(JsonValue::Object(map)) => Arg::map(map.into_iter().map(|(k, v)| (k, Param::Json(v)))),
        Ok(scalar) => Arg::Value(Param::Json(scalar)),
        Err(_) => Arg::from(raw),
    }
}
