//! peeringdb-dump - PeeringDB public snapshots to SQLite and D1-ready SQL
//!
//! This library downloads the public per-resource JSON snapshots, stores
//! every object in a single generic SQLite table keyed by resource and id,
//! and exports that table as SQL for bulk import into Cloudflare D1.
//!
//! # Artifacts
//!
//! - **Local store**: `peeringdb_dump.db` with table `objects(resource, obj_id, updated, payload)`
//! - **Full dump**: `peeringdb_dump.sql`, in the SQLite shell's `.dump` format
//! - **D1 bundle**: `d1_sql/00_schema.sql` plus one delete-then-insert chunk per resource
//! - **Filtered dump**: `peeringdb_dump_d1.sql`, the full dump without transaction markers and pragmas
//!
//! # Example
//!
//! ```no_run
//! use peeringdb_dump::{build_dump, ImportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ImportConfig::default();
//! build_dump(&config).await?;
//! # Ok(())
//! # }
//! ```

pub mod download;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod types;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
pub(crate) mod test_support;

pub use error::ImportError;
pub use orchestrator::{build_dump, fetch_and_store};
pub use store::ObjectStore;
pub use types::{DumpSummary, ImportConfig, ObjectRecord, Resource, DEFAULT_SNAPSHOT_URL};
