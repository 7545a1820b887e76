//! Data structures for snapshot import and export.

use crate::error::ImportError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default base URL of the public snapshot CDN.
pub const DEFAULT_SNAPSHOT_URL: &str = "https://public.peeringdb.com";

/// One category of registry object.
///
/// Declaration order is the import order: parents come before children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Org,
    Campus,
    Fac,
    Net,
    Ix,
    Carrier,
    CarrierFac,
    IxFac,
    IxLan,
    IxPfx,
    NetFac,
    NetIxLan,
}

impl Resource {
    /// Every resource, in import order.
    pub const ALL: [Resource; 12] = [
        Resource::Org,
        Resource::Campus,
        Resource::Fac,
        Resource::Net,
        Resource::Ix,
        Resource::Carrier,
        Resource::CarrierFac,
        Resource::IxFac,
        Resource::IxLan,
        Resource::IxPfx,
        Resource::NetFac,
        Resource::NetIxLan,
    ];

    /// The name used in snapshot URLs, table rows and chunk filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Org => "org",
            Resource::Campus => "campus",
            Resource::Fac => "fac",
            Resource::Net => "net",
            Resource::Ix => "ix",
            Resource::Carrier => "carrier",
            Resource::CarrierFac => "carrierfac",
            Resource::IxFac => "ixfac",
            Resource::IxLan => "ixlan",
            Resource::IxPfx => "ixpfx",
            Resource::NetFac => "netfac",
            Resource::NetIxLan => "netixlan",
        }
    }

    /// URL of this resource's full snapshot under `base_url`.
    pub fn snapshot_url(&self, base_url: &str) -> String {
        format!("{}/{}-0.json", base_url.trim_end_matches('/'), self.as_str())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ImportError::UnknownResource(s.to_string()))
    }
}

/// A single row of the `objects` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub resource: Resource,
    /// Unique within `resource`.
    pub obj_id: i64,
    /// Source timestamp, empty when the object carried none.
    pub updated: String,
    /// The whole source object as compact JSON.
    pub payload: String,
}

/// Configuration for a dump run.
///
/// # Example
///
/// ```
/// use peeringdb_dump::{ImportConfig, Resource};
///
/// let config = ImportConfig {
///     resources: vec![Resource::Net, Resource::Ix],
///     ..ImportConfig::default()
/// };
/// assert_eq!(config.chunk_dir.to_str(), Some("d1_sql"));
/// ```
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Base URL for snapshot downloads (e.g., `<https://public.peeringdb.com>`)
    pub snapshot_base_url: String,
    /// Local SQLite file.
    pub db_path: PathBuf,
    /// Full dump, transaction markers and pragmas included.
    pub dump_path: PathBuf,
    /// Full dump with transaction markers, pragmas and blank lines removed.
    pub filtered_dump_path: PathBuf,
    /// Directory for `00_schema.sql` and the per-resource chunk files.
    pub chunk_dir: PathBuf,
    /// Resources to fetch and export, in order.
    pub resources: Vec<Resource>,
    /// Drop and recreate the table before importing (default: true).
    pub fresh: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            snapshot_base_url: DEFAULT_SNAPSHOT_URL.to_string(),
            db_path: PathBuf::from("peeringdb_dump.db"),
            dump_path: PathBuf::from("peeringdb_dump.sql"),
            filtered_dump_path: PathBuf::from("peeringdb_dump_d1.sql"),
            chunk_dir: PathBuf::from("d1_sql"),
            resources: Resource::ALL.to_vec(),
            fresh: true,
        }
    }
}

/// What a dump run produced.
#[derive(Debug, Clone, Default)]
pub struct DumpSummary {
    /// Objects fetched per resource, in import order.
    pub imported: Vec<(Resource, usize)>,
    /// Statements written to the full dump.
    pub dump_statements: usize,
    pub schema_file: PathBuf,
    pub chunk_files: Vec<PathBuf>,
    /// Lines kept in the filtered dump.
    pub filtered_lines: usize,
}

impl DumpSummary {
    /// Total objects fetched across all resources.
    pub fn total_imported(&self) -> usize {
        self.imported.iter().map(|(_, n)| n).sum()
    }
}
