//! CLI entry point for mysql-helpers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mysql_helpers::{ConnectionConfig, Record, RowMode, Session, Table, Value};

#[derive(Parser)]
#[command(name = "mysqlh")]
#[command(about = "Run one MySQL statement and print the result")]
#[command(version)]
struct Cli {
    /// Load DB_* variables from this dotenv file before resolving the connection
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server host (overrides DB_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides DB_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// User name (overrides DB_USER)
    #[arg(short, long)]
    user: Option<String>,

    /// Password (overrides DB_PASS)
    #[arg(long)]
    password: Option<String>,

    /// Database name (overrides DB_NAME)
    #[arg(short, long)]
    database: Option<String>,

    /// Fail statements that produce server warnings
    #[arg(long)]
    raise_on_warnings: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print it as a table
    Table(Statement),
    /// Run a query and print one line per row
    Rows {
        #[command(flatten)]
        statement: Statement,

        /// Print rows as column-to-value mappings
        #[arg(long)]
        mapping: bool,
    },
    /// Run a mutating statement and print the affected row count
    Execute(Statement),
}

#[derive(Args)]
struct Statement {
    /// SQL text with %s placeholders
    sql: String,

    /// Placeholder value, repeat once per %s (`\N` sends NULL)
    #[arg(short, long = "param")]
    params: Vec<String>,
}

impl Statement {
    fn values(&self) -> Vec<Value> {
        self.params.iter().map(|p| parse_param(p)).collect()
    }
}

fn parse_param(raw: &str) -> Value {
    if raw == "\\N" {
        Value::Null
    } else {
        Value::Text(raw.to_string())
    }
}

fn connection_config(cli: &Cli) -> Result<ConnectionConfig> {
    let mut builder = ConnectionConfig::builder().raise_on_warnings(cli.raise_on_warnings);
    if let Some(host) = &cli.host {
        builder = builder.host(host);
    }
    if let Some(port) = cli.port {
        builder = builder.port(port);
    }
    if let Some(user) = &cli.user {
        builder = builder.user(user);
    }
    if let Some(password) = &cli.password {
        builder = builder.password(password);
    }
    if let Some(database) = &cli.database {
        builder = builder.database(database);
    }
    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --log-level
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    if let Some(path) = &cli.env_file {
        dotenv::from_path(path)
            .with_context(|| format!("failed to load env file {}", path.display()))?;
        debug!("loaded environment from {}", path.display());
    }

    let config = connection_config(&cli)?;
    info!(host = config.host(), port = config.port(), database = config.database(), "resolved connection");

    match &cli.command {
        Commands::Table(statement) => {
            let mut session = Session::new(config);
            let table = session
                .fetch_as_table(&statement.sql, statement.values(), true)
                .await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                print!("{}", render_table(&table));
            }
        }
        Commands::Rows { statement, mapping } => {
            let mode = if *mapping { RowMode::Mapping } else { RowMode::Tuple };
            let mut session = Session::new(config).with_row_mode(mode);
            let rows = session
                .fetch_as_rows(&statement.sql, statement.values(), true)
                .await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    println!("{}", render_record(row));
                }
            }
        }
        Commands::Execute(statement) => {
            let mut session = Session::new(config);
            let affected = session
                .execute(&statement.sql, statement.values(), true)
                .await?;
            if cli.json {
                println!("{}", serde_json::json!({ "affected_rows": affected }));
            } else {
                println!("{} row(s) affected", affected);
            }
        }
    }

    Ok(())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Bytes(v) => {
            let hex: String = v.iter().map(|b| format!("{:02x}", b)).collect();
            format!("0x{}", hex)
        }
        Value::Date(v) => v.to_string(),
        Value::DateTime(v) => v.to_string(),
        Value::Time(v) => v.to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::Json(v) => v.to_string(),
    }
}

/// Render a table with left-aligned, padded columns.
fn render_table(table: &Table) -> String {
    let cells: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(render_value).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns().iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |row: &[String]| -> String {
        let padded: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };

    let mut out = line(table.columns());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("{}\n", rule.join("-+-")));
    for row in &cells {
        out.push_str(&line(row.as_slice()));
    }
    out.push_str(&format!("({} row(s))\n", table.len()));
    out
}

fn render_record(record: &Record) -> String {
    match record {
        Record::Tuple(values) => {
            let cells: Vec<String> = values.iter().map(render_value).collect();
            format!("({})", cells.join(", "))
        }
        Record::Mapping(map) => {
            let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            let cells: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, render_value(v)))
                .collect();
            format!("{{{}}}", cells.join(", "))
        }
    }
}
