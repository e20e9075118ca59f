pub mod json;
pub mod table;

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::orchestrator::CycleReport;
use crate::retention::{Decision, RetentionPlan, RetentionStats};
use crate::snapshot::{Location, Snapshot, SnapshotInfo};

/// One snapshot as shown by `list` and `retain --dry-run`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub filename: String,
    pub path: PathBuf,
    pub location: Location,
    pub size_bytes: u64,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip)]
    pub age: Option<chrono::TimeDelta>,
}

impl SnapshotRow {
    fn new(snapshot: &Snapshot, now: DateTime<Utc>, decision: Option<Decision>) -> Self {
        SnapshotRow {
            filename: snapshot.filename.clone(),
            path: snapshot.path.clone(),
            location: snapshot.location,
            size_bytes: snapshot.size_bytes,
            created_at: snapshot
                .created_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            decision,
            age: snapshot.age_at(now),
        }
    }
}

/// Listing rows, newest first, unparseable names last.
pub fn listing_rows(plan: &RetentionPlan) -> Vec<SnapshotRow> {
    plan.actions
        .iter()
        .map(|a| SnapshotRow::new(&a.snapshot, plan.now, None))
        .collect()
}

pub fn plan_rows(plan: &RetentionPlan) -> Vec<SnapshotRow> {
    plan.actions
        .iter()
        .map(|a| SnapshotRow::new(&a.snapshot, plan.now, Some(a.decision)))
        .collect()
}

pub fn print_cycle(report: &CycleReport, json_output: bool) {
    if json_output {
        println!("{}", json::render(report));
    } else {
        print!("{}", table::render_snapshot(&report.snapshot));
        print!("{}", table::render_stats(&report.retention));
    }
}

pub fn print_snapshot(info: &SnapshotInfo, json_output: bool) {
    if json_output {
        println!("{}", json::render(info));
    } else {
        print!("{}", table::render_snapshot(info));
    }
}

pub fn print_stats(stats: &RetentionStats, json_output: bool) {
    if json_output {
        println!("{}", json::render(stats));
    } else {
        print!("{}", table::render_stats(stats));
    }
}

pub fn print_rows(rows: &[SnapshotRow], json_output: bool) {
    if json_output {
        println!("{}", json::render(&rows));
    } else {
        print!("{}", table::render_rows(rows));
    }
}
