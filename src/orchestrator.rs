//! One full backup cycle.
//!
//! Retention runs first and is allowed to fail: its error is logged and
//! replaced by zeroed stats. Snapshot creation runs second and its error is
//! the cycle's error. The whole cycle runs under the run lock.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::dump::SnapshotCreator;
use crate::error::Result;
use crate::lock::RunLock;
use crate::retention::{RetentionEngine, RetentionStats};
use crate::snapshot::SnapshotInfo;

/// The housekeeping half of a cycle.
pub trait RetentionPass {
    fn run(&self, now: DateTime<Utc>) -> Result<RetentionStats>;
}

/// The snapshot-producing half of a cycle.
pub trait SnapshotSource {
    fn create(&self) -> Result<SnapshotInfo>;
}

impl RetentionPass for RetentionEngine {
    fn run(&self, now: DateTime<Utc>) -> Result<RetentionStats> {
        self.apply_at(now)
    }
}

impl SnapshotSource for SnapshotCreator {
    fn create(&self) -> Result<SnapshotInfo> {
        SnapshotCreator::create(self)
    }
}

/// Payload handed back to whatever triggered the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub snapshot: SnapshotInfo,
    pub retention: RetentionStats,
}

pub struct Orchestrator<'a> {
    retention: &'a dyn RetentionPass,
    source: &'a dyn SnapshotSource,
    lock_dir: PathBuf,
    lock_wait: Duration,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        retention: &'a dyn RetentionPass,
        source: &'a dyn SnapshotSource,
        lock_dir: impl Into<PathBuf>,
    ) -> Self {
        Orchestrator {
            retention,
            source,
            lock_dir: lock_dir.into(),
            lock_wait: Duration::ZERO,
        }
    }

    pub fn lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn run(&self) -> Result<CycleReport> {
        let _lock = RunLock::acquire(&self.lock_dir, self.lock_wait)?;

        let retention = match self.retention.run(Utc::now()) {
            Ok(stats) => stats,
            Err(e) => {
                error!("retention failed, continuing with snapshot: {e}");
                RetentionStats::default()
            }
        };

        let snapshot = self.source.create()?;
        info!(file = %snapshot.filename, "backup cycle complete");

        Ok(CycleReport { snapshot, retention })
    }
}
