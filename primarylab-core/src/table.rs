//! The master table: every cycle's candidate-day records in one flat table.
//!
//! Records are sorted by [`RecordKey`] and the key is unique. The table is
//! built once and never mutated; evaluation works on borrowed records.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::domain::{CandidateDayRecord, ContestKey};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("duplicate master-table key {0}")]
    DuplicateKey(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterTable {
    records: Vec<CandidateDayRecord>,
}

impl MasterTable {
    /// Sort records by key and reject duplicates.
    pub fn from_records(mut records: Vec<CandidateDayRecord>) -> Result<Self, TableError> {
        records.sort_by_cached_key(|r| r.key());
        if let Some(pair) = records.windows(2).find(|w| w[0].key() == w[1].key()) {
            return Err(TableError::DuplicateKey(pair[0].key().to_string()));
        }
        Ok(Self { records })
    }

    /// Union per-cycle record sets into one table.
    pub fn union(cycles: impl IntoIterator<Item = Vec<CandidateDayRecord>>) -> Result<Self, TableError> {
        Self::from_records(cycles.into_iter().flatten().collect())
    }

    pub fn records(&self) -> &[CandidateDayRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contests(&self) -> BTreeSet<ContestKey> {
        self.records.iter().map(|r| r.contest()).collect()
    }

    /// Records grouped by contest, each group in key order.
    pub fn by_contest(&self) -> BTreeMap<ContestKey, Vec<&CandidateDayRecord>> {
        let mut groups: BTreeMap<ContestKey, Vec<&CandidateDayRecord>> = BTreeMap::new();
        for r in &self.records {
            groups.entry(r.contest()).or_default().push(r);
        }
        groups
    }

    /// Check the row-level and per-contest invariants of a built table.
    pub fn check_invariants(&self) -> Result<(), TableError> {
        for r in &self.records {
            let key = r.key();
            if r.observation_date > r.contest_date {
                return Err(TableError::Invariant(format!(
                    "{key}: observation after contest date {}",
                    r.contest_date
                )));
            }
            if r.date_dropped.is_some_and(|dropped| dropped < r.contest_date) {
                return Err(TableError::Invariant(format!(
                    "{key}: candidate withdrew before the contest"
                )));
            }
            if r.market_close.is_none() || r.poll_trend_adjusted.is_none() {
                return Err(TableError::Invariant(format!(
                    "{key}: missing market close or trend-adjusted poll"
                )));
            }
            for (field, value) in [
                ("poll_estimate", r.poll_estimate),
                ("market_close", r.market_close),
                ("vote_percent", r.vote_percent),
            ] {
                if value.is_some_and(|v| !(0.0..=1.0).contains(&v)) {
                    return Err(TableError::Invariant(format!(
                        "{key}: {field} outside [0, 1]"
                    )));
                }
            }
        }

        for (contest, rows) in self.by_contest() {
            let best = rows
                .iter()
                .filter_map(|r| r.vote_percent)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
            let Some(best) = best else {
                continue;
            };
            let winners: BTreeSet<&str> = rows
                .iter()
                .filter(|r| r.winner == Some(true))
                .map(|r| r.candidate_name.as_str())
                .collect();
            if winners.len() != 1 {
                return Err(TableError::Invariant(format!(
                    "{contest}: expected one winner, found {}",
                    winners.len()
                )));
            }
            let winner_share = rows
                .iter()
                .filter(|r| r.winner == Some(true))
                .find_map(|r| r.vote_percent);
            if winner_share != Some(best) {
                return Err(TableError::Invariant(format!(
                    "{contest}: winner does not hold the top vote share"
                )));
            }
        }
        Ok(())
    }

    /// BLAKE3 hash over the CSV rendering, stable across runs.
    pub fn fingerprint(&self) -> Result<String, TableError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(blake3::hash(&buf).to_hex().to_string())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut wtr = csv::Writer::from_writer(writer);
        for r in &self.records {
            wtr.serialize(r)?;
        }
        wtr.flush().map_err(|source| TableError::Io {
            path: "<writer>".into(),
            source,
        })
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let records = rdr
            .deserialize::<CandidateDayRecord>()
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_records(records)
    }

    pub fn save_csv(&self, path: &Path) -> Result<(), TableError> {
        let io_err = |source| TableError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        self.write_csv(file)
    }

    pub fn load_csv(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::read_csv(file)
    }
}
