//! Evaluation export: CSV and JSON artifacts.
//!
//! The master table has its own CSV writer in core; this module writes what
//! the evaluator derives from it: the per-lag accuracy sequence, per-contest
//! detail, and the build's warning list.

use std::path::Path;

use anyhow::{Context, Result};
use primarylab_core::Warning;

use crate::evaluator::{ContestSnapshot, EvaluationSnapshot};

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: lag_days, market_accuracy, poll_accuracy, market_contests, poll_contests.
/// Accuracies with no qualifying contest are left empty.
pub fn export_snapshots_csv(snapshots: &[EvaluationSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "lag_days",
        "market_accuracy",
        "poll_accuracy",
        "market_contests",
        "poll_contests",
    ])?;
    for s in snapshots {
        wtr.write_record([
            &s.lag_days.to_string(),
            &opt(s.market_accuracy),
            &opt(s.poll_accuracy),
            &s.market_contests.to_string(),
            &s.poll_contests.to_string(),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// One row per candidate per contest snapshot.
pub fn export_contests_csv(snapshots: &[ContestSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "lag_days",
        "cycle_year",
        "state",
        "candidate_name",
        "market_close",
        "poll_estimate",
        "market_rank",
        "poll_rank",
        "winner",
        "viable_candidates",
    ])?;
    for s in snapshots {
        for c in &s.candidates {
            wtr.write_record([
                s.lag_days.to_string(),
                s.contest.cycle.to_string(),
                s.contest.state.clone(),
                c.candidate_name.clone(),
                c.market_close.map(|v| v.to_string()).unwrap_or_default(),
                c.poll_estimate.map(|v| v.to_string()).unwrap_or_default(),
                c.market_rank.map(|v| v.to_string()).unwrap_or_default(),
                c.poll_rank.map(|v| v.to_string()).unwrap_or_default(),
                c.winner.map(|v| v.to_string()).unwrap_or_default(),
                s.viable_candidates.to_string(),
            ])?;
        }
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_snapshots_json(snapshots: &[EvaluationSnapshot]) -> Result<String> {
    serde_json::to_string_pretty(snapshots).context("failed to serialize evaluation snapshots")
}

pub fn export_warnings_json(warnings: &[Warning]) -> Result<String> {
    serde_json::to_string_pretty(warnings).context("failed to serialize warnings")
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write snapshots to `path`: JSON for a `.json` extension, CSV otherwise.
pub fn save_snapshots(path: &Path, snapshots: &[EvaluationSnapshot]) -> Result<()> {
    let body = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => export_snapshots_json(snapshots)?,
        _ => export_snapshots_csv(snapshots)?,
    };
    write_file(path, &body)
}

pub fn write_file(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}
