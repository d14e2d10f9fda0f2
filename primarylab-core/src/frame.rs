//! Polars view of the master table.
//!
//! The builder hands the finished table to [`validate`] as a second,
//! column-oriented check: key uniqueness via `unique_stable` and the
//! fraction ranges via a lazy filter, the same way bar data is canonicalized
//! and validated elsewhere in the stack.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::domain::CandidateDayRecord;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),

    #[error("{duplicates} duplicate keys and {out_of_range} out-of-range rows in {rows} rows")]
    Invalid {
        rows: usize,
        duplicates: usize,
        out_of_range: usize,
    },
}

pub const KEY_COLUMNS: [&str; 4] = ["cycle_year", "state", "observation_date", "candidate_name"];

const FRACTION_COLUMNS: [&str; 3] = ["poll_estimate", "market_close", "vote_percent"];

/// Summary of a frame validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub rows: usize,
    pub duplicates: usize,
    pub out_of_range: usize,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.out_of_range == 0
    }
}

fn epoch_days(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

fn date_column(name: &str, days: Vec<Option<i32>>) -> PolarsResult<Column> {
    Column::new(name.into(), days).cast(&DataType::Date)
}

/// Build a DataFrame with the master-table columns.
pub fn to_dataframe(records: &[CandidateDayRecord]) -> Result<DataFrame, FrameError> {
    let cycles: Vec<i32> = records.iter().map(|r| r.cycle_year.year() as i32).collect();
    let states: Vec<String> = records.iter().map(|r| r.state.clone()).collect();
    let contest: Vec<Option<i32>> = records.iter().map(|r| Some(epoch_days(r.contest_date))).collect();
    let observed: Vec<Option<i32>> = records
        .iter()
        .map(|r| Some(epoch_days(r.observation_date)))
        .collect();
    let names: Vec<String> = records.iter().map(|r| r.candidate_name.clone()).collect();
    let estimates: Vec<Option<f64>> = records.iter().map(|r| r.poll_estimate).collect();
    let trends: Vec<Option<f64>> = records.iter().map(|r| r.poll_trend_adjusted).collect();
    let closes: Vec<Option<f64>> = records.iter().map(|r| r.market_close).collect();
    let volumes: Vec<Option<u64>> = records.iter().map(|r| r.market_volume).collect();
    let dropped: Vec<Option<i32>> = records.iter().map(|r| r.date_dropped.map(epoch_days)).collect();
    let shares: Vec<Option<f64>> = records.iter().map(|r| r.vote_percent).collect();
    let winners: Vec<Option<bool>> = records.iter().map(|r| r.winner).collect();

    let df = DataFrame::new(vec![
        Column::new("cycle_year".into(), cycles),
        Column::new("state".into(), states),
        date_column("contest_date", contest)?,
        date_column("observation_date", observed)?,
        Column::new("candidate_name".into(), names),
        Column::new("poll_estimate".into(), estimates),
        Column::new("poll_trend_adjusted".into(), trends),
        Column::new("market_close".into(), closes),
        Column::new("market_volume".into(), volumes),
        date_column("date_dropped", dropped)?,
        Column::new("vote_percent".into(), shares),
        Column::new("winner".into(), winners),
    ])?;
    Ok(df)
}

fn out_of_unit_range(name: &str) -> Expr {
    col(name).lt(lit(0.0)).or(col(name).gt(lit(1.0)))
}

/// Count duplicate keys and out-of-range fractions.
pub fn inspect(df: &DataFrame) -> Result<FrameReport, FrameError> {
    let rows = df.height();

    let unique = df
        .clone()
        .lazy()
        .unique_stable(
            Some(KEY_COLUMNS.iter().map(|c| (*c).into()).collect()),
            UniqueKeepStrategy::First,
        )
        .collect()?;

    let bad_range = FRACTION_COLUMNS
        .iter()
        .map(|c| out_of_unit_range(c))
        .reduce(|a, b| a.or(b))
        .unwrap_or_else(|| lit(false));
    let out_of_range = df.clone().lazy().filter(bad_range).collect()?.height();

    Ok(FrameReport {
        rows,
        duplicates: rows - unique.height(),
        out_of_range,
    })
}

/// Build the frame and fail unless it is clean.
pub fn validate(records: &[CandidateDayRecord]) -> Result<FrameReport, FrameError> {
    let df = to_dataframe(records)?;
    let report = inspect(&df)?;
    if !report.is_clean() {
        return Err(FrameError::Invalid {
            rows: report.rows,
            duplicates: report.duplicates,
            out_of_range: report.out_of_range,
        });
    }
    Ok(report)
}
