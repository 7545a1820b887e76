//! SQL export artifacts: full dump, D1 bundle and filtered dump.

use crate::error::ImportError;
use crate::schema::{escape_literal, schema_script};
use crate::store::ObjectStore;
use crate::types::{ObjectRecord, Resource};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the schema file inside the chunk directory.
pub const SCHEMA_FILE: &str = "00_schema.sql";

/// Line prefixes D1 rejects in an imported script.
const SKIP_PREFIXES: [&str; 3] = ["BEGIN TRANSACTION", "COMMIT", "PRAGMA"];

/// Statement clearing every row of `resource`.
pub fn delete_statement(resource: Resource) -> String {
    format!("DELETE FROM objects WHERE resource = '{}';", resource)
}

/// Literal-valued upsert for one row.
pub fn insert_statement(record: &ObjectRecord) -> String {
    format!(
        "INSERT OR REPLACE INTO objects (resource,obj_id,updated,payload) VALUES ('{}',{},'{}','{}');",
        record.resource,
        record.obj_id,
        escape_literal(&record.updated),
        escape_literal(&record.payload)
    )
}

/// Whether a dump line is left out of the filtered dump.
pub fn is_skipped_line(line: &str) -> bool {
    let stripped = line.trim();
    stripped.is_empty() || SKIP_PREFIXES.iter().any(|p| stripped.starts_with(p))
}

fn create_parent_dir(path: &Path) -> Result<(), ImportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes the full dump of `store` to `path`.
///
/// Returns the number of statements written.
pub fn write_full_dump(store: &ObjectStore, path: &Path) -> Result<usize, ImportError> {
    create_parent_dir(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    let statements = store.write_dump(&mut out)?;
    out.flush()?;
    Ok(statements)
}

/// Writes `00_schema.sql` into `dir`.
pub fn write_schema_file(dir: &Path) -> Result<PathBuf, ImportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(SCHEMA_FILE);
    std::fs::write(&path, schema_script())?;
    Ok(path)
}

/// Writes `<resource>.sql` into `dir`: one delete for the resource followed
/// by an upsert per stored row, in table scan order.
///
/// Returns the file path and the number of rows written.
pub fn write_resource_chunk(
    store: &ObjectStore,
    dir: &Path,
    resource: Resource,
) -> Result<(PathBuf, usize), ImportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.sql", resource));
    let mut out = BufWriter::new(File::create(&path)?);

    writeln!(out, "{}", delete_statement(resource))?;
    let mut rows = 0usize;
    store.for_each_record(resource, |record| {
        writeln!(out, "{}", insert_statement(&record))?;
        rows += 1;
        Ok(())
    })?;
    out.flush()?;

    debug!("Chunk {} holds {} rows", path.display(), rows);
    Ok((path, rows))
}

/// Writes the schema file and one chunk per resource into `dir`.
///
/// Each file is reported on stdout as it is written.
pub fn write_d1_bundle(
    store: &ObjectStore,
    dir: &Path,
    resources: &[Resource],
) -> Result<(PathBuf, Vec<PathBuf>), ImportError> {
    let schema_path = write_schema_file(dir)?;
    println!("wrote schema file {}", schema_path.display());

    let mut chunks = Vec::with_capacity(resources.len());
    for &resource in resources {
        let (path, _) = write_resource_chunk(store, dir, resource)?;
        println!("wrote chunk {}", path.display());
        chunks.push(path);
    }
    Ok((schema_path, chunks))
}

/// Copies the dump at `src` to `dst`, dropping blank lines, transaction
/// markers and pragmas.
///
/// Returns the number of lines kept.
pub fn write_filtered_dump(src: &Path, dst: &Path) -> Result<usize, ImportError> {
    create_parent_dir(dst)?;
    let reader = BufReader::new(File::open(src)?);
    let mut out = BufWriter::new(File::create(dst)?);

    let mut kept = 0usize;
    for line in reader.lines() {
        let line = line?;
        if is_skipped_line(&line) {
            continue;
        }
        writeln!(out, "{}", line)?;
        kept += 1;
    }
    out.flush()?;
    Ok(kept)
}
