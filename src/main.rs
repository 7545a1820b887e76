use clap::Parser;
use peeringdb_dump::{build_dump, ImportConfig, Resource, DEFAULT_SNAPSHOT_URL};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "peeringdb-dump")]
#[command(about = "Fetch PeeringDB snapshots into SQLite and export SQL for D1 import", long_about = None)]
#[command(version)]
struct Args {
    /// Snapshot download base URL
    #[arg(long, default_value = DEFAULT_SNAPSHOT_URL)]
    snapshot_url: String,

    /// Local SQLite database file
    #[arg(long, default_value = "peeringdb_dump.db")]
    db: PathBuf,

    /// Full SQL dump output
    #[arg(long, default_value = "peeringdb_dump.sql")]
    sql: PathBuf,

    /// Filtered SQL dump output (no BEGIN/COMMIT/PRAGMA)
    #[arg(long, default_value = "peeringdb_dump_d1.sql")]
    d1_sql: PathBuf,

    /// Directory for the schema file and per-resource chunks
    #[arg(long, default_value = "d1_sql")]
    chunk_dir: PathBuf,

    /// Resources to import (comma-separated, e.g., "org,net"); all by default
    #[arg(short, long, value_delimiter = ',', value_parser = Resource::from_str)]
    resources: Vec<Resource>,

    /// Upsert into the existing table instead of rebuilding it
    #[arg(long)]
    keep_existing: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only artifact status lines
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("peeringdb_dump={}", log_level))
        .with_writer(std::io::stderr)
        .init();

    let resources = if args.resources.is_empty() {
        Resource::ALL.to_vec()
    } else {
        args.resources
    };

    info!("Snapshot source: {}", args.snapshot_url);
    info!("Resources: {:?}", resources);

    let config = ImportConfig {
        snapshot_base_url: args.snapshot_url,
        db_path: args.db,
        dump_path: args.sql,
        filtered_dump_path: args.d1_sql,
        chunk_dir: args.chunk_dir,
        resources,
        fresh: !args.keep_existing,
    };

    let summary = build_dump(&config).await?;
    info!(
        "✅ Imported {} objects across {} resource(s)",
        summary.total_imported(),
        summary.imported.len()
    );
    Ok(())
}
