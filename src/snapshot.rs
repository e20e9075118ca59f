//! Snapshot files and the filename contract.
//!
//! Every dump is named `backup_YYYY-MM-DD_HH-MM-SS.sql` with the creation
//! instant in UTC. The name is the only source of a snapshot's age: moving a
//! file between the active and archive directories can rewrite filesystem
//! timestamps, the name never changes.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

pub const FILENAME_PREFIX: &str = "backup_";
pub const FILENAME_EXTENSION: &str = ".sql";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
// YYYY-MM-DD_HH-MM-SS
const TIMESTAMP_LEN: usize = 19;

/// Where a snapshot currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Active,
    Archive,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Active => "active",
            Location::Archive => "archive",
        }
    }
}

/// One dump file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Parsed from the filename, `None` when the name does not follow the contract.
    pub created_at: Option<DateTime<Utc>>,
    pub location: Location,
}

impl Snapshot {
    pub fn new(path: PathBuf, size_bytes: u64, location: Location) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let created_at = parse_snapshot_timestamp(&filename);

        Snapshot {
            filename,
            path,
            size_bytes,
            created_at,
            location,
        }
    }

    /// Age relative to `now`, `None` for unparseable names.
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<chrono::TimeDelta> {
        self.created_at.map(|created| now - created)
    }
}

/// Result of a successful dump, the `snapshot` half of the cycle payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// UTC ISO-8601 instant at which the dump finished.
    pub created_at: String,
}

pub fn snapshot_filename(at: DateTime<Utc>) -> String {
    format!(
        "{FILENAME_PREFIX}{}{FILENAME_EXTENSION}",
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Parses the creation instant out of a snapshot filename.
pub fn parse_snapshot_timestamp(filename: &str) -> Option<DateTime<Utc>> {
    let stamp = filename
        .strip_prefix(FILENAME_PREFIX)?
        .strip_suffix(FILENAME_EXTENSION)?;

    // chrono accepts unpadded fields, the contract does not
    if stamp.len() != TIMESTAMP_LEN {
        return None;
    }

    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn is_snapshot_candidate(filename: &str) -> bool {
    filename.ends_with(FILENAME_EXTENSION)
}
