//! CandidateDayRecord: the atomic unit of the master table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::cycle::Cycle;

/// One candidate in one state on one observation date.
///
/// Field order is the column order of the persisted master table.
/// `vote_percent` is only set on the contest-eve row (`contest_date - 1`);
/// `winner` is set on every row of a contest once results are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDayRecord {
    pub cycle_year: Cycle,
    pub state: String,
    pub contest_date: NaiveDate,
    pub observation_date: NaiveDate,
    pub candidate_name: String,
    pub poll_estimate: Option<f64>,
    pub poll_trend_adjusted: Option<f64>,
    pub market_close: Option<f64>,
    pub market_volume: Option<u64>,
    pub date_dropped: Option<NaiveDate>,
    pub vote_percent: Option<f64>,
    pub winner: Option<bool>,
}

impl CandidateDayRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            cycle: self.cycle_year,
            state: self.state.clone(),
            observation_date: self.observation_date,
            candidate_name: self.candidate_name.clone(),
        }
    }

    pub fn contest(&self) -> ContestKey {
        ContestKey::new(self.cycle_year, &self.state)
    }

    /// Whole days between this observation and the contest.
    pub fn days_before_contest(&self) -> i64 {
        (self.contest_date - self.observation_date).num_days()
    }
}

/// Unique key of the master table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub cycle: Cycle,
    pub state: String,
    pub observation_date: NaiveDate,
    pub candidate_name: String,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.cycle, self.state, self.observation_date, self.candidate_name
        )
    }
}

/// One state's primary or caucus in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContestKey {
    pub cycle: Cycle,
    pub state: String,
}

impl ContestKey {
    pub fn new(cycle: Cycle, state: &str) -> Self {
        Self {
            cycle,
            state: state.to_string(),
        }
    }
}

impl std::fmt::Display for ContestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.cycle, self.state)
    }
}
