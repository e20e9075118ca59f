//! Snapshot storage on the local filesystem.
//!
//! Two flat directories hold every known snapshot:
//! - active: the primary rotation, where new dumps land
//! - archive: non-recent snapshots inside the medium-term window
//!
//! The archive may live inside the active directory (the default layout);
//! listings never descend into subdirectories so it is not listed twice.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::snapshot::{is_snapshot_candidate, Location, Snapshot};

pub struct SnapshotStore {
    active_dir: PathBuf,
    archive_dir: PathBuf,
}

impl SnapshotStore {
    /// Store over two directories. Nothing is created until [`create_dirs`](Self::create_dirs).
    pub fn new(active_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        SnapshotStore {
            active_dir: active_dir.into(),
            archive_dir: archive_dir.into(),
        }
    }

    /// Creates both directories if they don't exist.
    pub fn create_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.active_dir)?;
        fs::create_dir_all(&self.archive_dir)
    }

    pub fn active_dir(&self) -> &Path {
        &self.active_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Every `.sql` file in the active and archive directories. A missing
    /// directory holds no snapshots.
    pub fn scan(&self) -> io::Result<Vec<Snapshot>> {
        let mut snapshots = list_dir(&self.active_dir, Location::Active)?;
        snapshots.extend(list_dir(&self.archive_dir, Location::Archive)?);

        for snapshot in &snapshots {
            if snapshot.created_at.is_none() {
                warn!(file = %snapshot.filename, "could not parse timestamp from snapshot filename");
            }
        }

        Ok(snapshots)
    }

    /// Moves an active snapshot into the archive, returning the new path.
    pub fn move_to_archive(&self, snapshot: &Snapshot) -> io::Result<PathBuf> {
        let target = self.archive_dir.join(&snapshot.filename);
        move_file(&snapshot.path, &target)?;
        info!(file = %snapshot.filename, "archived snapshot");
        Ok(target)
    }

    pub fn delete(&self, snapshot: &Snapshot) -> io::Result<()> {
        fs::remove_file(&snapshot.path)?;
        info!(
            file = %snapshot.filename,
            location = snapshot.location.as_str(),
            "deleted old snapshot"
        );
        Ok(())
    }

    /// Deletes archived snapshots whose filename age exceeds `max_age`.
    ///
    /// Paths in `skip` are left alone, as are names without a parseable
    /// timestamp. A failed delete is logged and the sweep carries on.
    /// Returns the paths removed.
    pub fn sweep_archive(
        &self,
        now: DateTime<Utc>,
        max_age: TimeDelta,
        skip: &HashSet<PathBuf>,
    ) -> io::Result<Vec<PathBuf>> {
        let mut deleted = Vec::new();

        for snapshot in list_dir(&self.archive_dir, Location::Archive)? {
            if skip.contains(&snapshot.path) {
                continue;
            }
            let Some(age) = snapshot.age_at(now) else {
                continue;
            };
            if age <= max_age {
                continue;
            }

            match fs::remove_file(&snapshot.path) {
                Ok(()) => {
                    info!(file = %snapshot.filename, "deleted expired archived snapshot");
                    deleted.push(snapshot.path);
                }
                Err(e) => {
                    warn!(file = %snapshot.filename, "failed to delete expired archived snapshot: {e}");
                }
            }
        }

        Ok(deleted)
    }
}

fn list_dir(dir: &Path, location: Location) -> io::Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    if !dir.try_exists()? {
        return Ok(snapshots);
    }

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !is_snapshot_candidate(&name) {
            continue;
        }

        let size_bytes = entry.metadata().map_err(io::Error::from)?.len();
        snapshots.push(Snapshot::new(entry.into_path(), size_bytes, location));
    }

    Ok(snapshots)
}

// rename is atomic on one filesystem; the archive may be mounted elsewhere
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    // rename and copy both replace an existing target
    if to.try_exists()? {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
