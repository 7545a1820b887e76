//! Main orchestration logic for building the dump.

use crate::download::{fetch_snapshot, http_client};
use crate::error::ImportError;
use crate::export::{write_d1_bundle, write_filtered_dump, write_full_dump};
use crate::snapshot::records_from_snapshot;
use crate::store::ObjectStore;
use crate::types::{DumpSummary, ImportConfig, Resource};
use tracing::{debug, info};

/// Fetches one resource's snapshot and upserts every object into `store`.
///
/// # Returns
///
/// The length of the snapshot's `data` array. Duplicate ids within the
/// snapshot collapse to their last occurrence in the table.
pub async fn fetch_and_store(
    client: &reqwest::Client,
    base_url: &str,
    store: &mut ObjectStore,
    resource: Resource,
) -> Result<usize, ImportError> {
    let data = fetch_snapshot(client, base_url, resource).await?;
    let records = records_from_snapshot(resource, &data)?;
    store.upsert_records(&records)
}

/// Fetches every configured resource into the local store and writes all
/// export artifacts.
///
/// This is the main entry point. It performs the following steps, each
/// finishing before the next begins:
///
/// 1. Fetches and stores each resource in order
/// 2. Writes the full dump and closes the import connection
/// 3. Reopens the store and writes the schema file and per-resource chunks
/// 4. Writes the filtered dump from the full dump
///
/// Any failure aborts the run; files already written are left in place.
///
/// # Example
///
/// ```no_run
/// use peeringdb_dump::{build_dump, ImportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let summary = build_dump(&ImportConfig::default()).await?;
/// println!("{} objects", summary.total_imported());
/// # Ok(())
/// # }
/// ```
pub async fn build_dump(config: &ImportConfig) -> Result<DumpSummary, ImportError> {
    std::fs::create_dir_all(&config.chunk_dir)?;
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let client = http_client()?;
    let mut summary = DumpSummary::default();

    {
        let mut store = ObjectStore::open(&config.db_path)?;
        if config.fresh {
            store.recreate()?;
        }

        let pb = indicatif::ProgressBar::new(config.resources.len() as u64);
        pb.set_style(
            indicatif::ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed",
            )
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
            .progress_chars("█▓▒░ "),
        );

        for &resource in &config.resources {
            pb.set_message(format!("| ⬇️  Fetching: {}", resource));
            let rows =
                fetch_and_store(&client, &config.snapshot_base_url, &mut store, resource).await?;
            pb.suspend(|| eprintln!("{}: {} rows", resource, rows));
            let newest = store.max_updated(resource)?;
            debug!("{} newest updated: {:?}", resource, newest);
            summary.imported.push((resource, rows));
            pb.inc(1);
        }
        pb.finish_with_message(format!(
            "✅ Imported {} objects from {} resource(s)",
            summary.total_imported(),
            config.resources.len()
        ));

        summary.dump_statements = write_full_dump(&store, &config.dump_path)?;
    }
    println!(
        "wrote {} and {}",
        config.db_path.display(),
        config.dump_path.display()
    );

    let store = ObjectStore::open(&config.db_path)?;
    let (schema_file, chunk_files) = write_d1_bundle(&store, &config.chunk_dir, &config.resources)?;
    summary.schema_file = schema_file;
    summary.chunk_files = chunk_files;
    drop(store);

    summary.filtered_lines = write_filtered_dump(&config.dump_path, &config.filtered_dump_path)?;
    println!(
        "wrote {} (filtered for D1 execute; may still be large)",
        config.filtered_dump_path.display()
    );

    info!(
        "Dump complete: {} objects, {} statements, {} chunk files",
        summary.total_imported(),
        summary.dump_statements,
        summary.chunk_files.len()
    );
    Ok(summary)
}
