//! Retention engine.
//!
//! Runs the tiered policy over every snapshot in the active and archive
//! directories and applies the result:
//! - retained snapshots stay where they are (archived ones are not promoted)
//! - archive decisions move active snapshots into the archive
//! - delete decisions remove the file from its current location
//! - a final sweep removes anything left in the archive past the maximum age,
//!   retained or not
//!
//! At most one move or delete happens per snapshot per run. Nothing is rolled
//! back when a step fails: this is housekeeping, not a transaction.

pub mod policy;

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{BackupError, Result};
use crate::snapshot::Location;
use crate::store::SnapshotStore;
pub use policy::{Decision, PlannedAction, RetentionPlan, RetentionPolicy};

/// Outcome counts for one run. `total == retained + archived + deleted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetentionStats {
    pub total: usize,
    /// Snapshots left where they were.
    pub retained: usize,
    /// Snapshots moved from active to archive.
    pub archived: usize,
    pub deleted: usize,
}

pub struct RetentionEngine {
    store: SnapshotStore,
    policy: RetentionPolicy,
}

impl RetentionEngine {
    /// Engine over `active_dir` and `archive_dir`. Both are created on the
    /// first [`apply`](Self::apply); planning never touches the filesystem.
    pub fn new(active_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        RetentionEngine {
            store: SnapshotStore::new(active_dir, archive_dir),
            policy: RetentionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Classifies every known snapshot without touching the filesystem.
    pub fn plan_at(&self, now: DateTime<Utc>) -> Result<RetentionPlan> {
        let snapshots = self
            .store
            .scan()
            .map_err(|e| BackupError::retention("failed to scan snapshot directories", e))?;
        Ok(self.policy.plan(snapshots, now))
    }

    pub fn apply(&self) -> Result<RetentionStats> {
        self.apply_at(Utc::now())
    }

    pub fn apply_at(&self, now: DateTime<Utc>) -> Result<RetentionStats> {
        self.store.create_dirs().map_err(|e| {
            BackupError::retention(
                format!(
                    "failed to prepare {} and {}",
                    self.store.active_dir().display(),
                    self.store.archive_dir().display()
                ),
                e,
            )
        })?;

        let plan = self.plan_at(now)?;
        if plan.is_empty() {
            info!("no snapshots to manage");
            return Ok(RetentionStats::default());
        }

        let mut stats = RetentionStats {
            total: plan.actions.len(),
            ..RetentionStats::default()
        };
        // paths mutated this run are off limits to the sweep
        let mut mutated: HashSet<PathBuf> = HashSet::new();
        let mut left_in_place: HashSet<PathBuf> = HashSet::new();

        for PlannedAction { snapshot, decision } in &plan.actions {
            match (decision, snapshot.location) {
                (Decision::Retain, _) | (Decision::Archive, Location::Archive) => {
                    stats.retained += 1;
                    left_in_place.insert(snapshot.path.clone());
                }
                (Decision::Archive, Location::Active) => {
                    let moved_to = self.store.move_to_archive(snapshot).map_err(|e| {
                        BackupError::retention(format!("failed to archive {}", snapshot.filename), e)
                    })?;
                    stats.archived += 1;
                    mutated.insert(moved_to);
                }
                (Decision::Delete, _) => {
                    self.store.delete(snapshot).map_err(|e| {
                        BackupError::retention(format!("failed to delete {}", snapshot.filename), e)
                    })?;
                    stats.deleted += 1;
                    mutated.insert(snapshot.path.clone());
                }
            }
        }

        // expired archive files go regardless of bucket membership
        let swept = self
            .store
            .sweep_archive(now, self.policy.archive_max_age, &mutated)
            .map_err(|e| BackupError::retention("failed to sweep archive", e))?;
        for path in swept {
            if left_in_place.contains(&path) {
                stats.retained -= 1;
            } else {
                // reached the archive after the scan
                stats.total += 1;
            }
            stats.deleted += 1;
        }

        info!(
            total = stats.total,
            retained = stats.retained,
            archived = stats.archived,
            deleted = stats.deleted,
            "retention complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::snapshot_filename;
    use chrono::{TimeDelta, TimeZone};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn write(dir: &Path, at: DateTime<Utc>) -> PathBuf {
        let path = dir.join(snapshot_filename(at));
        fs::write(&path, "-- dump\n").unwrap();
        path
    }

    fn engine(root: &TempDir) -> RetentionEngine {
        let engine = RetentionEngine::new(root.path().join("backups"), root.path().join("backups/archive"));
        engine.store().create_dirs().unwrap();
        engine
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_empty_dirs() {
        let root = TempDir::new().unwrap();
        let stats = engine(&root).apply_at(now()).unwrap();
        assert_eq!(stats, RetentionStats::default());
    }

    #[test]
    fn test_ten_daily_snapshots_moves_four_to_archive() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        for day in 1..=10 {
            write(engine.store().active_dir(), Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap());
        }

        let stats = engine.apply_at(now()).unwrap();

        assert_eq!(
            stats,
            RetentionStats { total: 10, retained: 6, archived: 4, deleted: 0 }
        );
        assert_eq!(
            names(engine.store().archive_dir()),
            vec![
                "backup_2026-03-02_12-00-00.sql",
                "backup_2026-03-03_12-00-00.sql",
                "backup_2026-03-04_12-00-00.sql",
                "backup_2026-03-05_12-00-00.sql",
            ]
        );
        assert_eq!(names(engine.store().active_dir()).len(), 6);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        for days_ago in [0, 1, 2, 3, 4, 5, 9, 20, 40, 80, 200, 300, 400, 800] {
            write(engine.store().active_dir(), now() - TimeDelta::days(days_ago));
        }

        let first = engine.apply_at(now()).unwrap();
        assert_eq!(first.total, 14);
        assert_eq!(first.retained + first.archived + first.deleted, 14);
        assert!(first.deleted >= 2);

        let second = engine.apply_at(now() + TimeDelta::minutes(5)).unwrap();
        assert_eq!(second.archived, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.total, first.total - first.deleted);
        assert_eq!(second.retained, second.total);
    }

    #[test]
    fn test_retained_archive_snapshot_is_not_promoted() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        let archived = write(engine.store().archive_dir(), now() - TimeDelta::days(3));

        let stats = engine.apply_at(now()).unwrap();

        assert_eq!(stats, RetentionStats { total: 1, retained: 1, archived: 0, deleted: 0 });
        assert!(archived.exists());
        assert!(names(engine.store().active_dir()).is_empty());
    }

    #[test]
    fn test_age_boundary_in_archive() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        for hours_ago in 0..5 {
            write(engine.store().active_dir(), now() - TimeDelta::hours(hours_ago));
        }
        let kept = write(engine.store().archive_dir(), now() - TimeDelta::days(365));
        let expired = write(engine.store().archive_dir(), now() - TimeDelta::days(366));

        let stats = engine.apply_at(now()).unwrap();

        assert!(kept.exists());
        assert!(!expired.exists());
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.total, stats.retained + stats.archived + stats.deleted);
    }

    #[test]
    fn test_sweep_deletes_expired_archive_file_in_retain_set() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        // the only snapshot, so the recency bucket holds it
        let expired = write(engine.store().archive_dir(), now() - TimeDelta::days(366));

        let stats = engine.apply_at(now()).unwrap();

        assert!(!expired.exists());
        assert_eq!(stats, RetentionStats { total: 1, retained: 0, archived: 0, deleted: 1 });
    }

    #[test]
    fn test_sweep_keeps_counts_consistent_with_recent_snapshots() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        for hours_ago in 0..3 {
            write(engine.store().active_dir(), now() - TimeDelta::hours(hours_ago));
        }
        let expired = write(engine.store().archive_dir(), now() - TimeDelta::days(400));

        let stats = engine.apply_at(now()).unwrap();

        assert!(!expired.exists());
        assert_eq!(stats, RetentionStats { total: 4, retained: 3, archived: 0, deleted: 1 });
    }

    #[test]
    fn test_directories_created_on_apply_only() {
        let root = TempDir::new().unwrap();
        let active = root.path().join("backups");
        let archive = root.path().join("cold/archive");
        let engine = RetentionEngine::new(&active, &archive);

        let plan = engine.plan_at(now()).unwrap();
        assert!(plan.is_empty());
        assert!(!active.exists());
        assert!(!archive.exists());

        engine.apply_at(now()).unwrap();
        assert!(active.is_dir());
        assert!(archive.is_dir());
    }

    #[test]
    fn test_unusable_archive_dir_is_a_retention_error() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        let engine = RetentionEngine::new(root.path().join("backups"), blocker.join("archive"));

        let err = engine.apply_at(now()).unwrap_err();
        assert!(matches!(err, BackupError::Retention { .. }));
    }

    #[test]
    fn test_old_active_snapshot_deleted_outright() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        for hours_ago in 0..5 {
            write(engine.store().active_dir(), now() - TimeDelta::hours(hours_ago));
        }
        let stale = write(engine.store().active_dir(), now() - TimeDelta::days(500));

        let stats = engine.apply_at(now()).unwrap();

        assert!(!stale.exists());
        assert!(!engine.store().archive_dir().join(snapshot_filename(now() - TimeDelta::days(500))).exists());
        assert_eq!(stats, RetentionStats { total: 6, retained: 5, archived: 0, deleted: 1 });
    }

    #[test]
    fn test_unparseable_file_moves_to_archive_and_stays() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        fs::write(engine.store().active_dir().join("manual-export.sql"), "-- manual\n").unwrap();

        let stats = engine.apply_at(now()).unwrap();
        assert_eq!(stats.archived, 1);
        assert!(engine.store().archive_dir().join("manual-export.sql").exists());

        // decades later it is still not deleted
        let later = now() + TimeDelta::days(365 * 30);
        let stats = engine.apply_at(later).unwrap();
        assert_eq!(stats.deleted, 0);
        assert!(engine.store().archive_dir().join("manual-export.sql").exists());
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        for days_ago in [0, 1, 2, 3, 4, 5, 6, 400] {
            write(engine.store().active_dir(), now() - TimeDelta::days(days_ago));
        }

        let plan = engine.plan_at(now()).unwrap();
        assert_eq!(plan.count(Decision::Delete), 1);
        assert_eq!(names(engine.store().active_dir()).len(), 8);
    }

    #[test]
    fn test_failed_move_is_a_retention_error() {
        let root = TempDir::new().unwrap();
        let engine = engine(&root);
        for hours_ago in 0..5 {
            write(engine.store().active_dir(), now() - TimeDelta::hours(hours_ago));
        }
        // same week and month as the newest five, so it is archived; its archive slot is a directory
        let blocked = now() - TimeDelta::hours(7);
        write(engine.store().active_dir(), blocked);
        let slot = engine.store().archive_dir().join(snapshot_filename(blocked));
        fs::create_dir(&slot).unwrap();
        fs::write(slot.join("x"), "x").unwrap();

        let err = engine.apply_at(now()).unwrap_err();
        assert!(matches!(err, BackupError::Retention { .. }));
    }
}
