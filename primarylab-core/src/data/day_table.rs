//! Per-cycle accumulator of poll and market observations.
//!
//! Rows are keyed by `(state, date, name)`, so every merge into the table is
//! a keyed upsert and re-merging the same input cannot duplicate rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{CandidateDayRecord, Cycle};

/// Join key of the poll/market merge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey {
    pub state: String,
    pub date: NaiveDate,
    pub name: String,
}

/// One candidate-state-day before results are attached.
///
/// Poll-only rows have no market fields; market-only rows have no poll
/// fields and no contest date.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRow {
    pub state: String,
    pub contest_date: Option<NaiveDate>,
    pub name: String,
    pub date: NaiveDate,
    pub market_close: Option<f64>,
    pub market_volume: Option<u64>,
    pub poll_estimate: Option<f64>,
    pub poll_trend_adjusted: Option<f64>,
}

impl DayRow {
    pub fn key(&self) -> DayKey {
        DayKey {
            state: self.state.clone(),
            date: self.date,
            name: self.name.clone(),
        }
    }

    /// A row survives integration only with both a market quote and a
    /// trend-adjusted poll number, on or before its contest.
    fn is_complete(&self) -> bool {
        self.market_close.is_some()
            && self.poll_trend_adjusted.is_some()
            && self.contest_date.is_some_and(|c| self.date <= c)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayTable {
    rows: BTreeMap<DayKey, DayRow>,
}

impl DayTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table from poll rows. A later row with the same key replaces an earlier one.
    pub fn from_polls(rows: impl IntoIterator<Item = DayRow>) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.upsert(row);
        }
        table
    }

    pub fn upsert(&mut self, row: DayRow) {
        self.rows.insert(row.key(), row);
    }

    pub fn get(&self, key: &DayKey) -> Option<&DayRow> {
        self.rows.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &DayKey) -> Option<&mut DayRow> {
        self.rows.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &DayRow> {
        self.rows.values()
    }

    /// Keep complete rows and lift them into master-table records for `cycle`.
    pub fn into_records(self, cycle: Cycle) -> Vec<CandidateDayRecord> {
        self.rows
            .into_values()
            .filter(DayRow::is_complete)
            .filter_map(|row| {
                let contest_date = row.contest_date?;
                Some(CandidateDayRecord {
                    cycle_year: cycle,
                    state: row.state,
                    contest_date,
                    observation_date: row.date,
                    candidate_name: row.name,
                    poll_estimate: row.poll_estimate,
                    poll_trend_adjusted: row.poll_trend_adjusted,
                    market_close: row.market_close,
                    market_volume: row.market_volume,
                    date_dropped: None,
                    vote_percent: None,
                    winner: None,
                })
            })
            .collect()
    }
}
