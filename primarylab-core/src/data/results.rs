//! Final results: extraction, ranking, and attachment to the master rows.
//!
//! Each contest is described declaratively by a [`ContestDescriptor`]: where
//! the results page lives, how many candidates and columns it reports, and the
//! CSS selector that addresses its cells. [`extract_results`] turns one page
//! into ranked [`ContestResult`]s; the builder then folds
//! [`attach_contest_results`] over all contests into a [`ResultsLedger`] and
//! applies it with [`apply_results`].
//!
//! Ranks are recomputed from the parsed vote share instead of trusting the
//! page's listing order; ties keep listing order.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::parse::{parse_grouped_count, parse_percent, Columns};
use crate::diagnostics::Diagnostics;
use crate::domain::CandidateDayRecord;
use crate::names::{NameRegistry, NameSource};

/// Role of one reported column on a results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultColumn {
    Name,
    Percent,
    Votes,
    /// Delegate counts; read past and ignored.
    Delegates,
}

fn default_selector() -> String {
    "td".to_string()
}

/// Where one contest's results live and how the page is shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestDescriptor {
    pub state: String,
    /// Local path or http(s) URL of the results document.
    pub source: String,
    /// Number of candidate rows on the page.
    pub candidates: usize,
    /// Number of reported cells per candidate row.
    pub columns: usize,
    #[serde(default = "default_selector")]
    pub selector: String,
    /// Explicit column roles; defaults by column count when absent.
    #[serde(default)]
    pub layout: Option<Vec<ResultColumn>>,
}

impl ContestDescriptor {
    /// Column roles for this page.
    ///
    /// Without an explicit layout, 3 columns read as name/percent/votes and
    /// 4 columns add a trailing delegate count.
    pub fn layout(&self) -> Result<Vec<ResultColumn>, DataError> {
        let layout_err = |reason: String| DataError::Layout {
            contest: self.state.clone(),
            reason,
        };
        let layout = match (&self.layout, self.columns) {
            (Some(explicit), _) => explicit.clone(),
            (None, 3) => vec![ResultColumn::Name, ResultColumn::Percent, ResultColumn::Votes],
            (None, 4) => vec![
                ResultColumn::Name,
                ResultColumn::Percent,
                ResultColumn::Votes,
                ResultColumn::Delegates,
            ],
            (None, n) => {
                return Err(layout_err(format!(
                    "no default layout for {n} columns; declare one"
                )))
            }
        };
        if layout.len() != self.columns {
            return Err(layout_err(format!(
                "layout lists {} roles for {} columns",
                layout.len(),
                self.columns
            )));
        }
        for required in [ResultColumn::Name, ResultColumn::Percent] {
            let count = layout.iter().filter(|c| **c == required).count();
            if count != 1 {
                return Err(layout_err(format!(
                    "layout needs exactly one {required:?} column, found {count}"
                )));
            }
        }
        Ok(layout)
    }
}

/// One candidate's final result in one contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestResult {
    pub candidate_name: String,
    pub votes: Option<u64>,
    pub vote_percent: f64,
    /// 1-based finish position by vote share.
    pub final_rank: u32,
}

fn is_placeholder(raw: &str) -> bool {
    let lower = raw.trim().to_lowercase();
    lower == "other" || lower == "others" || lower.starts_with("uncommitted")
}

/// Sort by descending vote share (stable, so ties keep input order) and number 1..n.
fn rank_by_vote_share(results: &mut [ContestResult]) {
    results.sort_by(|a, b| b.vote_percent.total_cmp(&a.vote_percent));
    for (i, r) in results.iter_mut().enumerate() {
        r.final_rank = i as u32 + 1;
    }
}

/// Extract ranked results from one contest's HTML.
///
/// Fails with [`DataError::ShapeMismatch`] when the selector does not address
/// exactly `candidates × columns` cells.
pub fn extract_results(
    html: &str,
    descriptor: &ContestDescriptor,
    registry: &NameRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ContestResult>, DataError> {
    let layout = descriptor.layout()?;
    let selector = Selector::parse(&descriptor.selector).map_err(|e| DataError::Selector {
        contest: descriptor.state.clone(),
        selector: descriptor.selector.clone(),
        reason: format!("{e:?}"),
    })?;

    let document = Html::parse_document(html);
    let cells: Vec<String> = document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();

    let expected = descriptor.candidates * descriptor.columns;
    if cells.len() != expected || descriptor.columns == 0 {
        return Err(DataError::ShapeMismatch {
            contest: descriptor.state.clone(),
            candidates: descriptor.candidates,
            columns: descriptor.columns,
            expected,
            found: cells.len(),
        });
    }

    let mut results = Vec::with_capacity(descriptor.candidates);
    for (i, row) in cells.chunks(descriptor.columns).enumerate() {
        let parse_err = |reason: String| DataError::Parse {
            file: descriptor.source.clone(),
            row: i as u64 + 1,
            reason,
        };
        let mut raw_name = "";
        let mut percent = None;
        let mut votes = None;
        for (role, cell) in layout.iter().zip(row) {
            match role {
                ResultColumn::Name => raw_name = cell.as_str(),
                ResultColumn::Percent => percent = Some(parse_percent(cell).map_err(parse_err)?),
                ResultColumn::Votes => votes = Some(parse_grouped_count(cell).map_err(parse_err)?),
                ResultColumn::Delegates => {}
            }
        }
        if is_placeholder(raw_name) {
            continue;
        }
        let vote_percent = percent.ok_or_else(|| parse_err("no percentage cell".into()))?;
        results.push(ContestResult {
            candidate_name: registry.normalize_reporting(
                raw_name,
                NameSource::Results,
                diagnostics,
            ),
            votes,
            vote_percent,
            final_rank: 0,
        });
    }

    rank_by_vote_share(&mut results);
    Ok(results)
}

/// Load the by-state results CSV (`state, name, vote_percent`).
///
/// `vote_percent` is on a 0–100 scale. Results come back grouped by state and
/// ranked within each state.
pub fn load_results_csv(
    path: &Path,
    registry: &NameRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<BTreeMap<String, Vec<ContestResult>>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_results_csv(file, &path.display().to_string(), registry, diagnostics)
}

pub fn read_results_csv<R: Read>(
    reader: R,
    file: &str,
    registry: &NameRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<BTreeMap<String, Vec<ContestResult>>, DataError> {
    let csv_err = |source| DataError::Csv {
        file: file.to_string(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();
    let cols = Columns::new(file, &headers);
    let state_idx = cols.require("state")?;
    let name_idx = cols.require("name")?;
    let percent_idx = cols.require("vote_percent")?;

    let mut by_state: BTreeMap<String, Vec<ContestResult>> = BTreeMap::new();
    for result in rdr.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let vote_percent = parse_percent(field(percent_idx)).map_err(|reason| DataError::Parse {
            file: file.to_string(),
            row: line,
            reason,
        })?;
        if is_placeholder(field(name_idx)) {
            continue;
        }
        by_state
            .entry(field(state_idx).to_string())
            .or_default()
            .push(ContestResult {
                candidate_name: registry.normalize_reporting(
                    field(name_idx),
                    NameSource::Results,
                    diagnostics,
                ),
                votes: None,
                vote_percent,
                final_rank: 0,
            });
    }

    for results in by_state.values_mut() {
        rank_by_vote_share(results);
    }
    Ok(by_state)
}

/// A result joined to its candidate's contest-eve row.
#[derive(Debug, Clone, PartialEq)]
pub struct EveResult {
    pub state: String,
    pub candidate_name: String,
    pub observation_date: NaiveDate,
    pub vote_percent: f64,
    pub final_rank: u32,
}

/// Running accumulator of joined results, keyed by `(state, candidate)`.
///
/// Each attached contest also remembers its rank-1 candidate. A contest only
/// has a winner when that candidate joined; otherwise it is treated as having
/// no results. Attaching a contest twice replaces its earlier entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsLedger {
    entries: BTreeMap<(String, String), EveResult>,
    leaders: BTreeMap<String, String>,
}

impl ResultsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &EveResult> {
        self.entries.values()
    }

    pub fn states(&self) -> BTreeSet<&str> {
        self.entries.keys().map(|(s, _)| s.as_str()).collect()
    }

    /// Winner of `state`: its rank-1 candidate, if that candidate joined.
    pub fn winner(&self, state: &str) -> Option<&str> {
        self.leaders
            .get(state)
            .filter(|leader| self.get(state, leader).is_some())
            .map(String::as_str)
    }

    /// Contests whose rank-1 candidate had no contest-eve row, as
    /// `(state, candidate)`.
    pub fn unmatched_leaders(&self) -> impl Iterator<Item = (&str, &str)> {
        self.leaders
            .iter()
            .filter(|(state, leader)| self.get(state, leader).is_none())
            .map(|(state, leader)| (state.as_str(), leader.as_str()))
    }

    fn get(&self, state: &str, name: &str) -> Option<&EveResult> {
        self.entries.get(&(state.to_string(), name.to_string()))
    }
}

/// Join one contest's results to the state's eve rows and append them.
///
/// Only candidates with a row on `contest_date - 1` and a positive vote share
/// are kept; candidates missing from the table simply do not join. States
/// with no rows in `records` leave the ledger untouched.
pub fn attach_contest_results(
    mut ledger: ResultsLedger,
    records: &[CandidateDayRecord],
    state: &str,
    results: &[ContestResult],
) -> ResultsLedger {
    if !records.iter().any(|r| r.state == state) {
        return ledger;
    }
    ledger.entries.retain(|(s, _), _| s != state);
    ledger.leaders.remove(state);

    let by_name: BTreeMap<&str, &ContestResult> = results
        .iter()
        .map(|r| (r.candidate_name.as_str(), r))
        .collect();

    for record in records.iter().filter(|r| r.state == state) {
        let Some(eve) = record.contest_date.pred_opt() else {
            continue;
        };
        if record.observation_date != eve {
            continue;
        }
        let Some(result) = by_name.get(record.candidate_name.as_str()) else {
            continue;
        };
        if result.vote_percent <= 0.0 {
            continue;
        }
        ledger.entries.insert(
            (state.to_string(), record.candidate_name.clone()),
            EveResult {
                state: state.to_string(),
                candidate_name: record.candidate_name.clone(),
                observation_date: record.observation_date,
                vote_percent: result.vote_percent,
                final_rank: result.final_rank,
            },
        );
    }

    if let Some(leader) = results
        .iter()
        .find(|r| r.final_rank == 1 && r.vote_percent > 0.0)
    {
        ledger
            .leaders
            .insert(state.to_string(), leader.candidate_name.clone());
    }
    ledger
}

/// What `winner` should be for contests without any attached results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingResults {
    /// Leave `winner` null.
    Null,
    /// Mark every candidate as not the winner.
    NotWinner,
}

/// Write `vote_percent` onto eve rows and `winner` onto every row.
///
/// Contests without a winner in the ledger fall back to `missing` and carry
/// no vote shares.
pub fn apply_results(
    records: Vec<CandidateDayRecord>,
    ledger: &ResultsLedger,
    missing: MissingResults,
) -> Vec<CandidateDayRecord> {
    let winners: BTreeMap<&str, &str> = ledger
        .states()
        .into_iter()
        .filter_map(|s| ledger.winner(s).map(|w| (s, w)))
        .collect();

    records
        .into_iter()
        .map(|mut r| {
            match winners.get(r.state.as_str()) {
                Some(winner) => {
                    r.winner = Some(*winner == r.candidate_name);
                    r.vote_percent = ledger
                        .get(&r.state, &r.candidate_name)
                        .filter(|e| e.observation_date == r.observation_date)
                        .map(|e| e.vote_percent);
                }
                None => {
                    r.winner = match missing {
                        MissingResults::Null => None,
                        MissingResults::NotWinner => Some(false),
                    };
                    r.vote_percent = None;
                }
            }
            r
        })
        .collect()
}
