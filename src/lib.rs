//! Dated full-content database snapshots with tiered retention.
//!
//! One cycle applies the retention policy to every snapshot in the active
//! and archive directories, then creates a new snapshot with the external
//! dump tool. See [`orchestrator::Orchestrator`].

pub mod cli;
pub mod config;
pub mod dump;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod platform;
pub mod report;
pub mod retention;
pub mod snapshot;
pub mod store;
pub mod util;

pub use dump::SnapshotCreator;
pub use error::BackupError;
pub use orchestrator::{CycleReport, Orchestrator};
pub use retention::{RetentionEngine, RetentionPolicy, RetentionStats};
pub use snapshot::{Snapshot, SnapshotInfo};
