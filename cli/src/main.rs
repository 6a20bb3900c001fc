use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sew_core::TableDescriptor;
use sew_core::statement::create_table_sql;
use sew_sqlite::{
    ColumnRef, Database, DatabaseConfig, EntryKind, Engine, RelationKind, TableKind,
};

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "sew")]
#[command(about = "Inspect the tables, metadata pairings and relationships of a SQLite database")]
struct Cli {
    #[command(flatten)]
    database: DatabaseArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct DatabaseArgs {
    /// Database file path.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// YAML connection configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, global = true, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every table and view with its kind.
    Tables,
    /// Show one table's columns, constraints and pairings.
    Describe(NameArgs),
    /// List foreign-key relationships by referenced column.
    Relationships,
    /// Print the CREATE statement for a table or view.
    Ddl(NameArgs),
}

#[derive(Debug, Args)]
struct NameArgs {
    /// Table or view name.
    name: String,
}

/// One line of `sew tables`.
#[derive(Debug, Serialize)]
struct TableSummary<'a> {
    name: &'a str,
    kind: TableKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    columns: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata_table: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    data_tables: Vec<&'a str>,
}

/// Output of `sew describe`.
#[derive(Debug, Serialize)]
struct TableDetail<'a> {
    name: &'a str,
    kind: TableKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    descriptor: Option<&'a TableDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata_table: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    data_tables: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    referenced_by: Vec<Reference<'a>>,
}

#[derive(Debug, Serialize)]
struct Reference<'a> {
    column: &'a str,
    children: Vec<&'a ColumnRef>,
}

fn main() {
    let cli = Cli::parse();

    let result = open_database(&cli.database).and_then(|mut db| match cli.command {
        Command::Tables => run_tables(&db, cli.database.format),
        Command::Describe(args) => run_describe(&db, &args.name, cli.database.format),
        Command::Relationships => run_relationships(&db, cli.database.format),
        Command::Ddl(args) => run_ddl(&mut db, &args.name),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn open_database(args: &DatabaseArgs) -> Result<Database, String> {
    let path = args
        .db
        .as_ref()
        .ok_or_else(|| "Specify the database file with --db".to_string())?;
    if !path.exists() {
        return Err(format!("Database '{}' does not exist", path.display()));
    }

    let config = match &args.config {
        Some(config_path) => DatabaseConfig::load(config_path).map_err(|e| {
            format!(
                "Failed to load config '{}': {e}",
                config_path.display()
            )
        })?,
        None => DatabaseConfig::default(),
    };

    Database::open_with_config(path, config)
        .map_err(|e| format!("Failed to open database '{}': {e}", path.display()))
}

// ---------------------------------------------------------------------------
// commands
// ---------------------------------------------------------------------------

fn run_tables(db: &Database, format: CliOutputFormat) -> Result<(), String> {
    let summaries: Vec<TableSummary<'_>> = db
        .catalog()
        .entries()
        .map(|entry| {
            let (metadata_table, data_tables) = pairing(&entry.kind);
            TableSummary {
                name: &entry.name,
                kind: entry.table_kind(),
                columns: entry.descriptor().map(|d| d.columns().len()),
                metadata_table,
                data_tables,
            }
        })
        .collect();
    print_formatted(&summaries, format)
}

fn run_describe(db: &Database, name: &str, format: CliOutputFormat) -> Result<(), String> {
    let entry = db
        .catalog()
        .get(name)
        .ok_or_else(|| format!("Table '{name}' not found"))?;
    let (metadata_table, data_tables) = pairing(&entry.kind);

    let referenced_by = db
        .relationships()
        .iter()
        .filter(|(parent, _)| parent.table == name)
        .map(|(parent, children)| Reference {
            column: &parent.column,
            children: children.iter().collect(),
        })
        .collect();

    let detail = TableDetail {
        name: &entry.name,
        kind: entry.table_kind(),
        descriptor: entry.descriptor().map(|d| &**d),
        metadata_table,
        data_tables,
        referenced_by,
    };
    print_formatted(&detail, format)
}

fn run_relationships(db: &Database, format: CliOutputFormat) -> Result<(), String> {
    print_formatted(db.relationships(), format)
}

fn run_ddl(db: &mut Database, name: &str) -> Result<(), String> {
    let kind = db
        .kind_of(name)
        .ok_or_else(|| format!("Table '{name}' not found"))?;

    if kind == TableKind::View {
        let view = db
            .engine_mut()
            .list_relations(&[RelationKind::View])
            .map_err(|e| format!("Failed to list views: {e}"))?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| format!("View '{name}' not found"))?;
        println!("{}", view.definition);
        return Ok(());
    }

    let descriptor = db
        .catalog()
        .get(name)
        .and_then(|e| e.descriptor())
        .ok_or_else(|| format!("Table '{name}' has no definition"))?;
    println!(
        "{}",
        create_table_sql(descriptor, name, false, db.catalog().statement_options())
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Metadata table of a data table, or data tables of a metadata table.
fn pairing(kind: &EntryKind) -> (Option<&str>, Vec<&str>) {
    match kind {
        EntryKind::DataTable { metadata_table, .. } => (Some(metadata_table.as_str()), Vec::new()),
        EntryKind::MetaTable { data_tables, .. } => {
            (None, data_tables.iter().map(String::as_str).collect())
        }
        EntryKind::Ordinary(_) | EntryKind::View => (None, Vec::new()),
    }
}

fn print_formatted<T: Serialize + ?Sized>(value: &T, format: CliOutputFormat) -> Result<(), String> {
    let rendered = match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| format!("Failed to serialize output: {e}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| format!("Failed to serialize output: {e}"))?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
