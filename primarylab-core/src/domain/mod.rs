//! Domain types for Primarylab

pub mod cycle;
pub mod record;

pub use cycle::{Cycle, UnsupportedCycle};
pub use record::{CandidateDayRecord, ContestKey, RecordKey};
