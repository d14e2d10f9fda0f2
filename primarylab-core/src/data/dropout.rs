//! Withdrawal dates and the dropout filter.
//!
//! A candidate stays in a state's slice only if they were still in the race on
//! that state's contest date. The built-in tables are hand-curated per cycle;
//! a candidate with no entry never withdrew.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{CandidateDayRecord, Cycle};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropoutTable {
    dates: BTreeMap<String, NaiveDate>,
}

const DROPOUTS_2016: &[(&str, (i32, u32, u32))] = &[
    ("Martin O'Malley", (2016, 2, 1)),
    ("Bernie Sanders", (2016, 7, 12)),
];

const DROPOUTS_2020: &[(&str, (i32, u32, u32))] = &[
    ("Beto O'Rourke", (2019, 11, 1)),
    ("Kamala Harris", (2019, 12, 3)),
    ("Julian Castro", (2020, 1, 2)),
    ("Marianne Williamson", (2020, 1, 10)),
    ("Cory Booker", (2020, 1, 13)),
    ("John Delaney", (2020, 1, 31)),
    ("Andrew Yang", (2020, 2, 11)),
    ("Michael Bennet", (2020, 2, 11)),
    ("Deval Patrick", (2020, 2, 12)),
    ("Tom Steyer", (2020, 2, 29)),
    ("Pete Buttigieg", (2020, 3, 1)),
    ("Amy Klobuchar", (2020, 3, 2)),
    ("Michael Bloomberg", (2020, 3, 4)),
    ("Elizabeth Warren", (2020, 3, 5)),
    ("Tulsi Gabbard", (2020, 3, 19)),
    ("Bernie Sanders", (2020, 4, 8)),
];

impl DropoutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Curated withdrawal dates for `cycle`.
    pub fn builtin(cycle: Cycle) -> Self {
        let entries = match cycle {
            Cycle::Y2016 => DROPOUTS_2016,
            Cycle::Y2020 => DROPOUTS_2020,
        };
        let dates = entries
            .iter()
            .filter_map(|(name, (y, m, d))| {
                NaiveDate::from_ymd_opt(*y, *m, *d).map(|date| (name.to_string(), date))
            })
            .collect();
        Self { dates }
    }

    /// Set or replace one candidate's withdrawal date.
    pub fn set(&mut self, name: &str, date: NaiveDate) {
        self.dates.insert(name.to_string(), date);
    }

    pub fn date_dropped(&self, name: &str) -> Option<NaiveDate> {
        self.dates.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Attach `date_dropped` and drop rows from contests held after the withdrawal.
///
/// A row is kept when the candidate never withdrew or withdrew on or after
/// the contest date.
pub fn apply_dropouts(
    records: Vec<CandidateDayRecord>,
    dropouts: &DropoutTable,
) -> Vec<CandidateDayRecord> {
    let before = records.len();
    let kept: Vec<CandidateDayRecord> = records
        .into_iter()
        .map(|mut r| {
            r.date_dropped = dropouts.date_dropped(&r.candidate_name);
            r
        })
        .filter(|r| r.date_dropped.map_or(true, |dropped| dropped >= r.contest_date))
        .collect();
    tracing::debug!(before, after = kept.len(), "applied dropout filter");
    kept
}
