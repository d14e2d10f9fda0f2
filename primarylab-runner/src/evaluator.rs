//! Accuracy evaluator.
//!
//! At a given lag every contest is reduced to the rows observed exactly
//! `lag_days` before the contest. Candidates are ranked by market close and,
//! independently, by poll estimate; a source is correct for a contest when the
//! actual winner holds rank 1. Ranks are min-ranks, so tied leaders share
//! rank 1.
//!
//! Everything here is computed from borrowed records; the master table is
//! never touched.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use primarylab_core::{CandidateDayRecord, ContestKey, MasterTable};

/// Market price above which a candidate counts as viable.
pub const VIABLE_THRESHOLD: f64 = 0.01;

/// Descending min-rank: rank = 1 + number of strictly greater values.
/// Missing values are unranked.
pub fn min_rank_desc(values: &[Option<f64>]) -> Vec<Option<u32>> {
    values
        .iter()
        .map(|v| {
            v.map(|x| {
                let above = values.iter().flatten().filter(|&&other| other > x).count();
                above as u32 + 1
            })
        })
        .collect()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// One candidate's standing in a contest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub candidate_name: String,
    pub market_close: Option<f64>,
    pub poll_estimate: Option<f64>,
    pub market_rank: Option<u32>,
    pub poll_rank: Option<u32>,
    pub winner: Option<bool>,
}

/// A contest as seen `lag_days` before it was held.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContestSnapshot {
    pub contest: ContestKey,
    pub lag_days: u32,
    pub candidates: Vec<RankedCandidate>,
    /// Candidates with `market_close > 0.01`.
    pub viable_candidates: usize,
}

impl ContestSnapshot {
    fn from_rows(contest: ContestKey, lag_days: u32, rows: &[&CandidateDayRecord]) -> Self {
        let closes: Vec<Option<f64>> = rows.iter().map(|r| r.market_close).collect();
        let polls: Vec<Option<f64>> = rows.iter().map(|r| r.poll_estimate).collect();
        let market_ranks = min_rank_desc(&closes);
        let poll_ranks = min_rank_desc(&polls);

        let candidates: Vec<RankedCandidate> = rows
            .iter()
            .zip(market_ranks.into_iter().zip(poll_ranks))
            .map(|(r, (market_rank, poll_rank))| RankedCandidate {
                candidate_name: r.candidate_name.clone(),
                market_close: r.market_close,
                poll_estimate: r.poll_estimate,
                market_rank,
                poll_rank,
                winner: r.winner,
            })
            .collect();
        let viable_candidates = candidates
            .iter()
            .filter(|c| c.market_close.is_some_and(|p| p > VIABLE_THRESHOLD))
            .count();

        Self {
            contest,
            lag_days,
            candidates,
            viable_candidates,
        }
    }

    /// The actual winner's row, if the winner was observed at this lag.
    pub fn winner(&self) -> Option<&RankedCandidate> {
        self.candidates.iter().find(|c| c.winner == Some(true))
    }

    /// `None` when there is no winner row or the winner has no market close.
    pub fn market_correct(&self) -> Option<bool> {
        let winner = self.winner()?;
        winner.market_close?;
        Some(winner.market_rank == Some(1))
    }

    /// `None` when there is no winner row or the winner has no poll estimate.
    pub fn poll_correct(&self) -> Option<bool> {
        let winner = self.winner()?;
        winner.poll_estimate?;
        Some(winner.poll_rank == Some(1))
    }
}

/// Per-contest snapshots at `lag_days`, in contest order.
///
/// With `eligible` set, only those contests are considered.
pub fn contest_snapshots(
    table: &MasterTable,
    lag_days: u32,
    eligible: Option<&BTreeSet<ContestKey>>,
) -> Vec<ContestSnapshot> {
    let mut groups: BTreeMap<ContestKey, Vec<&CandidateDayRecord>> = BTreeMap::new();
    for r in table.records() {
        if r.days_before_contest() != i64::from(lag_days) {
            continue;
        }
        let contest = r.contest();
        if eligible.is_some_and(|set| !set.contains(&contest)) {
            continue;
        }
        groups.entry(contest).or_default().push(r);
    }

    groups
        .into_iter()
        .map(|(contest, rows)| ContestSnapshot::from_rows(contest, lag_days, &rows))
        .collect()
}

/// Accuracy of both sources at one lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSnapshot {
    pub lag_days: u32,
    /// Percent correct, 2 dp; `None` when no contest qualifies.
    pub market_accuracy: Option<f64>,
    pub poll_accuracy: Option<f64>,
    /// Contests counted for each source.
    pub market_contests: usize,
    pub poll_contests: usize,
}

fn accuracy(outcomes: impl Iterator<Item = Option<bool>>) -> (Option<f64>, usize) {
    let (mut correct, mut total) = (0usize, 0usize);
    for hit in outcomes.flatten() {
        total += 1;
        if hit {
            correct += 1;
        }
    }
    if total == 0 {
        return (None, 0);
    }
    (Some(round2(correct as f64 / total as f64 * 100.0)), total)
}

pub fn evaluate(
    table: &MasterTable,
    lag_days: u32,
    eligible: Option<&BTreeSet<ContestKey>>,
) -> EvaluationSnapshot {
    let snapshots = contest_snapshots(table, lag_days, eligible);
    let (market_accuracy, market_contests) =
        accuracy(snapshots.iter().map(ContestSnapshot::market_correct));
    let (poll_accuracy, poll_contests) =
        accuracy(snapshots.iter().map(ContestSnapshot::poll_correct));

    tracing::debug!(
        lag_days,
        ?market_accuracy,
        ?poll_accuracy,
        market_contests,
        poll_contests,
        "evaluated lag"
    );

    EvaluationSnapshot {
        lag_days,
        market_accuracy,
        poll_accuracy,
        market_contests,
        poll_contests,
    }
}

/// One snapshot per lag, in ascending lag order.
pub fn evaluate_range(
    table: &MasterTable,
    lags: RangeInclusive<u32>,
    eligible: Option<&BTreeSet<ContestKey>>,
) -> Vec<EvaluationSnapshot> {
    lags.map(|lag| evaluate(table, lag, eligible)).collect()
}

/// Mean absolute error of each source against the final vote share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteShareError {
    /// Contest-eve rows carrying a vote share.
    pub rows: usize,
    pub contests: usize,
    pub poll_mae: Option<f64>,
    pub market_mae: Option<f64>,
}

fn mean_abs(pairs: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (sum, n) = pairs.fold((0.0, 0usize), |(s, n), (a, b)| (s + (a - b).abs(), n + 1));
    (n > 0).then(|| ((sum / n as f64) * 10_000.0).round() / 10_000.0)
}

/// Compare eve-row poll estimates and market closes with `vote_percent`.
pub fn vote_share_error(table: &MasterTable) -> VoteShareError {
    let eve: Vec<(&CandidateDayRecord, f64)> = table
        .records()
        .iter()
        .filter_map(|r| r.vote_percent.map(|v| (r, v)))
        .collect();
    let contests: BTreeSet<ContestKey> = eve.iter().map(|(r, _)| r.contest()).collect();

    VoteShareError {
        rows: eve.len(),
        contests: contests.len(),
        poll_mae: mean_abs(eve.iter().filter_map(|(r, v)| r.poll_estimate.map(|p| (p, *v)))),
        market_mae: mean_abs(eve.iter().filter_map(|(r, v)| r.market_close.map(|m| (m, *v)))),
    }
}
