//! Terminal tables for snapshots and retention results.

use super::SnapshotRow;
use crate::retention::RetentionStats;
use crate::snapshot::SnapshotInfo;
use crate::util::{format_age, format_bytes};

pub fn render_snapshot(info: &SnapshotInfo) -> String {
    let mut output = String::new();
    output.push_str("\nSnapshot\n");
    output.push_str(&"-".repeat(40));
    output.push('\n');
    output.push_str(&format!("  {:12} {}\n", "file", info.filename));
    output.push_str(&format!("  {:12} {}\n", "path", info.path.display()));
    output.push_str(&format!("  {:12} {}\n", "size", format_bytes(info.size_bytes)));
    output.push_str(&format!("  {:12} {}\n", "created", info.created_at));
    output
}

pub fn render_stats(stats: &RetentionStats) -> String {
    let mut output = String::new();
    output.push_str("\nRetention\n");
    output.push_str(&"-".repeat(40));
    output.push('\n');
    for (label, count) in [
        ("total", stats.total),
        ("retained", stats.retained),
        ("archived", stats.archived),
        ("deleted", stats.deleted),
    ] {
        output.push_str(&format!("  {label:12} {count:>6}\n"));
    }
    output
}

pub fn render_rows(rows: &[SnapshotRow]) -> String {
    if rows.is_empty() {
        return String::from("No snapshots found.\n");
    }

    let with_decision = rows.iter().any(|r| r.decision.is_some());
    let mut output = String::new();

    output.push_str(&format!(
        "{:<34} {:<8} {:>10} {:>10}",
        "File", "Location", "Age", "Size"
    ));
    if with_decision {
        output.push_str(&format!(" {:<8}", "Action"));
    }
    output.push('\n');
    output.push_str(&"-".repeat(if with_decision { 75 } else { 66 }));
    output.push('\n');

    let mut total_bytes: u64 = 0;
    for row in rows {
        total_bytes = total_bytes.saturating_add(row.size_bytes);
        let age = row.age.map(format_age).unwrap_or_else(|| "unknown".to_string());

        output.push_str(&format!(
            "{:<34} {:<8} {:>10} {:>10}",
            truncate(&row.filename, 34),
            row.location.as_str(),
            age,
            format_bytes(row.size_bytes)
        ));
        if let Some(decision) = row.decision {
            output.push_str(&format!(" {:<8}", decision.as_str()));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "\n{} snapshots, {}\n",
        rows.len(),
        format_bytes(total_bytes)
    ));
    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
