//! SQLite storage for snapshot objects

use crate::error::ImportError;
use crate::schema::{self, escape_literal};
use crate::types::{ObjectRecord, Resource};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Row cap for [`ObjectStore::query`] when none is given.
pub const DEFAULT_QUERY_LIMIT: i64 = 250;

/// Generic `(resource, obj_id, updated, payload)` table over one SQLite connection
pub struct ObjectStore {
    conn: Connection,
}

impl ObjectStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, ImportError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), ImportError> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Drop every row and rebuild the table and index.
    pub fn recreate(&self) -> Result<(), ImportError> {
        self.conn.execute(schema::DROP_OBJECTS_TABLE, [])?;
        self.initialize_schema()
    }

    /// Insert or replace rows keyed by `(resource, obj_id)`, in one transaction.
    ///
    /// Later duplicates of the same key overwrite earlier ones.
    pub fn upsert_records(&mut self, records: &[ObjectRecord]) -> Result<usize, ImportError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO objects (resource, obj_id, updated, payload) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.resource.as_str(),
                    record.obj_id,
                    record.updated,
                    record.payload,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Number of rows stored for `resource`.
    pub fn count(&self, resource: Resource) -> Result<usize, ImportError> {
        let n: i64 = self.conn.query_row(
            "SELECT count(*) FROM objects WHERE resource = ?1",
            [resource.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Newest `updated` value stored for `resource`, if it has any rows.
    pub fn max_updated(&self, resource: Resource) -> Result<Option<String>, ImportError> {
        let ts = self.conn.query_row(
            "SELECT MAX(updated) FROM objects WHERE resource = ?1",
            [resource.as_str()],
            |row| row.get(0),
        )?;
        Ok(ts)
    }

    /// Visit every row of `resource` in table scan order.
    pub fn for_each_record<F>(&self, resource: Resource, mut f: F) -> Result<(), ImportError>
    where
        F: FnMut(ObjectRecord) -> Result<(), ImportError>,
    {
        let mut stmt = self
            .conn
            .prepare("SELECT obj_id, updated, payload FROM objects WHERE resource = ?1")?;
        let mut rows = stmt.query([resource.as_str()])?;
        while let Some(row) = rows.next()? {
            f(row_to_record(resource, row)?)?;
        }
        Ok(())
    }

    /// Get one row by `(resource, obj_id)`
    pub fn get(&self, resource: Resource, obj_id: i64) -> Result<Option<ObjectRecord>, ImportError> {
        self.conn
            .query_row(
                "SELECT obj_id, updated, payload FROM objects WHERE resource = ?1 AND obj_id = ?2",
                params![resource.as_str(), obj_id],
                |row| row_to_record(resource, row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// List rows of `resource` ordered by `obj_id`.
    ///
    /// * `id` - only the row with this id
    /// * `since` - only rows whose `updated` is later than this Unix time;
    ///   rows with an empty or unparseable `updated` never match
    /// * `limit` - at most this many rows, clamped to at least 1
    ///   (default: [`DEFAULT_QUERY_LIMIT`])
    pub fn query(
        &self,
        resource: Resource,
        id: Option<i64>,
        since: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ObjectRecord>, ImportError> {
        let mut sql = String::from("SELECT obj_id, updated, payload FROM objects WHERE resource = ?1");
        let mut bindings: Vec<SqlValue> = vec![SqlValue::Text(resource.as_str().to_string())];

        if let Some(id) = id {
            bindings.push(SqlValue::Integer(id));
            sql.push_str(&format!(" AND obj_id = ?{}", bindings.len()));
        }

        if let Some(since_ts) = since {
            bindings.push(SqlValue::Integer(since_ts));
            sql.push_str(&format!(
                " AND datetime(updated) > datetime(?{}, 'unixepoch')",
                bindings.len()
            ));
        }

        bindings.push(SqlValue::Integer(limit.unwrap_or(DEFAULT_QUERY_LIMIT).max(1)));
        sql.push_str(&format!(" ORDER BY obj_id LIMIT ?{}", bindings.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(bindings), |row| row_to_record(resource, row))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(records)
    }

    /// Execute a SQL script such as a chunk file against this store.
    pub fn apply_sql_file(&self, path: &Path) -> Result<(), ImportError> {
        let script = std::fs::read_to_string(path)?;
        self.conn.execute_batch(&script)?;
        Ok(())
    }

    /// Write every statement needed to recreate the database, in the format
    /// of the SQLite shell's `.dump`.
    ///
    /// Returns the number of statements written.
    pub fn write_dump<W: Write>(&self, out: &mut W) -> Result<usize, ImportError> {
        writeln!(out, "PRAGMA foreign_keys=OFF;")?;
        writeln!(out, "BEGIN TRANSACTION;")?;
        let mut written = 2;

        let mut stmt = self.conn.prepare(
            "SELECT name, sql FROM sqlite_master \
             WHERE sql NOT NULL AND type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;

        for (name, sql) in tables {
            writeln!(out, "{};", sql)?;
            written += 1;

            let select = row_dump_query(&self.table_columns(&name)?, &name);
            debug!("Dumping table {} with {}", name, select);
            let mut stmt = self.conn.prepare(&select)?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let line: String = row.get(0)?;
                writeln!(out, "{}", line)?;
                written += 1;
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT sql FROM sqlite_master \
             WHERE sql NOT NULL AND type IN ('index', 'trigger', 'view') \
             ORDER BY name",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let sql: String = row.get(0)?;
            writeln!(out, "{};", sql)?;
            written += 1;
        }

        writeln!(out, "COMMIT;")?;
        Ok(written + 1)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>, ImportError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(columns)
    }
}

fn row_to_record(resource: Resource, row: &Row<'_>) -> rusqlite::Result<ObjectRecord> {
    Ok(ObjectRecord {
        resource,
        obj_id: row.get(0)?,
        updated: row.get(1)?,
        payload: row.get(2)?,
    })
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A SELECT yielding one `INSERT INTO "<table>" VALUES(...);` line per row,
/// with values rendered by SQLite's own `quote()`.
fn row_dump_query(columns: &[String], table: &str) -> String {
    let values = columns
        .iter()
        .map(|c| format!("quote({})", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(" || ',' || ");
    let prefix = format!("INSERT INTO {} VALUES(", quote_ident(table));
    format!(
        "SELECT '{}' || {} || ');' FROM {}",
        escape_literal(&prefix),
        values,
        quote_ident(table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(resource: Resource, obj_id: i64, updated: &str, payload: &str) -> ObjectRecord {
        ObjectRecord {
            resource,
            obj_id,
            updated: updated.to_string(),
            payload: payload.to_string(),
        }
    }

    fn rows(store: &ObjectStore, resource: Resource) -> Vec<ObjectRecord> {
        let mut out = Vec::new();
        store
            .for_each_record(resource, |r| {
                out.push(r);
                Ok(())
            })
            .unwrap();
        out.sort_by_key(|r| r.obj_id);
        out
    }

    #[test]
    fn test_upsert_collapses_duplicate_ids() {
        let mut store = ObjectStore::open_in_memory().unwrap();
        let records = vec![
            record(Resource::Net, 1, "a", r#"{"id":1,"v":1}"#),
            record(Resource::Net, 2, "", r#"{"id":2}"#),
            record(Resource::Net, 1, "b", r#"{"id":1,"v":2}"#),
        ];

        assert_eq!(store.upsert_records(&records).unwrap(), 3);
        assert_eq!(store.count(Resource::Net).unwrap(), 2);

        let stored = rows(&store, Resource::Net);
        assert_eq!(stored[0].updated, "b");
        assert_eq!(stored[0].payload, r#"{"id":1,"v":2}"#);
    }

    #[test]
    fn test_same_id_in_different_resources() {
        let mut store = ObjectStore::open_in_memory().unwrap();
        store
            .upsert_records(&[
                record(Resource::Net, 1, "", "{}"),
                record(Resource::Ix, 1, "", "{}"),
            ])
            .unwrap();
        assert_eq!(store.count(Resource::Net).unwrap(), 1);
        assert_eq!(store.count(Resource::Ix).unwrap(), 1);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = ObjectStore::open_in_memory().unwrap();
        let records = vec![
            record(Resource::Org, 1, "2024-01-01T00:00:00Z", r#"{"id":1}"#),
            record(Resource::Org, 2, "", r#"{"id":2}"#),
        ];
        store.upsert_records(&records).unwrap();
        let mut first = Vec::new();
        store.write_dump(&mut first).unwrap();

        store.upsert_records(&records).unwrap();
        let mut second = Vec::new();
        store.write_dump(&mut second).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_max_updated() {
        let mut store = ObjectStore::open_in_memory().unwrap();
        assert_eq!(store.max_updated(Resource::Fac).unwrap(), None);
        store
            .upsert_records(&[
                record(Resource::Fac, 1, "2023-05-01T00:00:00Z", "{}"),
                record(Resource::Fac, 2, "2024-02-01T00:00:00Z", "{}"),
            ])
            .unwrap();
        assert_eq!(
            store.max_updated(Resource::Fac).unwrap().as_deref(),
            Some("2024-02-01T00:00:00Z")
        );
    }

    #[test]
    fn test_get_by_id() {
        let mut store = ObjectStore::open_in_memory().unwrap();
        store
            .upsert_records(&[
                record(Resource::Net, 1, "", r#"{"id":1}"#),
                record(Resource::Ix, 1, "", r#"{"id":1,"ix":true}"#),
            ])
            .unwrap();

        let net = store.get(Resource::Net, 1).unwrap().unwrap();
        assert_eq!(net.payload, r#"{"id":1}"#);
        assert_eq!(net.resource, Resource::Net);
        assert!(store.get(Resource::Net, 2).unwrap().is_none());
        assert!(store.get(Resource::Fac, 1).unwrap().is_none());
    }

    fn query_store() -> ObjectStore {
        let mut store = ObjectStore::open_in_memory().unwrap();
        store
            .upsert_records(&[
                record(Resource::Net, 3, "2024-06-01T00:00:00Z", "{}"),
                record(Resource::Net, 1, "2023-12-31T23:59:59Z", "{}"),
                record(Resource::Net, 2, "", "{}"),
                record(Resource::Net, 4, "2024-01-01T00:00:00Z", "{}"),
                record(Resource::Ix, 5, "2025-01-01T00:00:00Z", "{}"),
            ])
            .unwrap();
        store
    }

    fn ids(records: &[ObjectRecord]) -> Vec<i64> {
        records.iter().map(|r| r.obj_id).collect()
    }

    #[test]
    fn test_query_orders_by_id() {
        let store = query_store();
        let all = store.query(Resource::Net, None, None, None).unwrap();
        assert_eq!(ids(&all), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_query_id_filter() {
        let store = query_store();
        let one = store.query(Resource::Net, Some(3), None, None).unwrap();
        assert_eq!(ids(&one), vec![3]);
        assert!(store
            .query(Resource::Net, Some(5), None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_query_since_filter() {
        let store = query_store();
        // 2024-01-01T00:00:00Z
        let since = 1_704_067_200;
        let newer = store.query(Resource::Net, None, Some(since), None).unwrap();
        assert_eq!(ids(&newer), vec![3]);

        let from_2023 = store
            .query(Resource::Net, None, Some(since - 86_400), None)
            .unwrap();
        assert_eq!(ids(&from_2023), vec![1, 3, 4]);
    }

    #[test]
    fn test_query_limit_clamp_and_default() {
        let store = query_store();
        assert_eq!(
            ids(&store.query(Resource::Net, None, None, Some(2)).unwrap()),
            vec![1, 2]
        );
        assert_eq!(
            ids(&store.query(Resource::Net, None, None, Some(0)).unwrap()),
            vec![1]
        );
        assert_eq!(
            ids(&store.query(Resource::Net, None, None, Some(-5)).unwrap()),
            vec![1]
        );

        let mut big = ObjectStore::open_in_memory().unwrap();
        let records: Vec<_> = (1..=300)
            .map(|id| record(Resource::Org, id, "", "{}"))
            .collect();
        big.upsert_records(&records).unwrap();
        let page = big.query(Resource::Org, None, None, None).unwrap();
        assert_eq!(page.len() as i64, DEFAULT_QUERY_LIMIT);
        assert_eq!(page[0].obj_id, 1);
    }

    #[test]
    fn test_recreate_clears_rows() {
        let mut store = ObjectStore::open_in_memory().unwrap();
        store
            .upsert_records(&[record(Resource::Ix, 5, "", "{}")])
            .unwrap();
        store.recreate().unwrap();
        assert_eq!(store.count(Resource::Ix).unwrap(), 0);
    }

    #[test]
    fn test_write_dump_layout() {
        let mut store = ObjectStore::open_in_memory().unwrap();
        store
            .upsert_records(&[record(Resource::Net, 3, "", r#"{"name":"O'Brien"}"#)])
            .unwrap();

        let mut out = Vec::new();
        let statements = store.write_dump(&mut out).unwrap();
        let dump = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = dump.lines().collect();

        // pragma, begin, table, one row, index, commit
        assert_eq!(statements, 6);
        assert_eq!(lines[0], "PRAGMA foreign_keys=OFF;");
        assert_eq!(lines[1], "BEGIN TRANSACTION;");
        assert!(lines[2].starts_with("CREATE TABLE"));
        assert!(dump.contains(
            r#"INSERT INTO "objects" VALUES('net',3,'','{"name":"O''Brien"}');"#
        ));
        assert!(dump.contains("CREATE INDEX objects_resource_updated_idx"));
        assert_eq!(*lines.last().unwrap(), "COMMIT;");
    }

    #[test]
    fn test_dump_replays_into_empty_database() {
        let mut store = ObjectStore::open_in_memory().unwrap();
        store
            .upsert_records(&[
                record(Resource::Carrier, 1, "x", r#"{"a":"it's"}"#),
                record(Resource::Carrier, 2, "", "{}"),
            ])
            .unwrap();
        let mut out = Vec::new();
        store.write_dump(&mut out).unwrap();

        let replay = Connection::open_in_memory().unwrap();
        replay
            .execute_batch(&String::from_utf8(out).unwrap())
            .unwrap();
        let n: i64 = replay
            .query_row("SELECT count(*) FROM objects", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }
}
