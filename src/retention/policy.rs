//! Tiered retention classification.
//!
//! A snapshot is retained when it falls in any of three buckets:
//! - recency: the newest `keep_latest` snapshots
//! - weekly: the newest snapshot of each ISO week inside `weekly_window`
//! - monthly: the newest snapshot of each calendar month inside `monthly_window`
//!
//! Everything else is archived while its age is at most `archive_max_age`
//! and deleted past it. Names without a parseable timestamp are always
//! archived: they are never deleted on a guessed age.
//!
//! Classification is pure. It looks at filenames and "now" only, so the
//! same file set and the same instant always produce the same plan.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use serde::Serialize;

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_latest: usize,
    pub weekly_window: TimeDelta,
    pub monthly_window: TimeDelta,
    pub archive_max_age: TimeDelta,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy {
            keep_latest: 5,
            weekly_window: TimeDelta::weeks(4),
            monthly_window: TimeDelta::days(365),
            archive_max_age: TimeDelta::days(365),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// In the retain-set: stays where it is, active or archived.
    Retain,
    /// Belongs in the archive; a no-op for snapshots already there.
    Archive,
    Delete,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Retain => "retain",
            Decision::Archive => "archive",
            Decision::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedAction {
    pub snapshot: Snapshot,
    pub decision: Decision,
}

/// One decision per known snapshot, newest first, unparseable names last.
#[derive(Debug, Clone)]
pub struct RetentionPlan {
    pub now: DateTime<Utc>,
    pub actions: Vec<PlannedAction>,
}

impl RetentionPlan {
    pub fn count(&self, decision: Decision) -> usize {
        self.actions.iter().filter(|a| a.decision == decision).count()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl RetentionPolicy {
    pub fn plan(&self, mut snapshots: Vec<Snapshot>, now: DateTime<Utc>) -> RetentionPlan {
        // None sorts below Some, so reversing puts unparseable names at the end
        snapshots.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.filename.cmp(&b.filename))
                .then_with(|| a.path.cmp(&b.path))
        });

        let dated: Vec<DateTime<Utc>> = snapshots.iter().map_while(|s| s.created_at).collect();
        let retained = self.retain_set(&dated, now);

        let actions = snapshots
            .into_iter()
            .enumerate()
            .map(|(i, snapshot)| {
                let decision = match snapshot.created_at {
                    None => Decision::Archive,
                    Some(_) if retained.contains(&i) => Decision::Retain,
                    Some(created) if now - created <= self.archive_max_age => Decision::Archive,
                    Some(_) => Decision::Delete,
                };
                PlannedAction { snapshot, decision }
            })
            .collect();

        RetentionPlan { now, actions }
    }

    /// Indices into `dated` (newest first) that must be kept this run.
    fn retain_set(&self, dated: &[DateTime<Utc>], now: DateTime<Utc>) -> HashSet<usize> {
        let mut retained: HashSet<usize> = (0..self.keep_latest.min(dated.len())).collect();

        let mut weeks_seen = HashSet::new();
        for (i, created) in dated.iter().enumerate() {
            if now - *created > self.weekly_window {
                break;
            }
            let week = created.iso_week();
            if weeks_seen.insert((week.year(), week.week())) {
                retained.insert(i);
            }
        }

        let mut months_seen = HashSet::new();
        for (i, created) in dated.iter().enumerate() {
            if now - *created > self.monthly_window {
                break;
            }
            if months_seen.insert((created.year(), created.month())) {
                retained.insert(i);
            }
        }

        retained
    }
}
