//! Primarylab Core — domain types, loaders, and the master table.
//!
//! This crate holds everything that turns raw primary-season inputs into one
//! candidate-per-day table:
//! - Domain types (cycles, contest keys, candidate-day records)
//! - Canonical name registry shared by every source
//! - Poll, market and results loaders, plus the dropout filter
//! - Master table with invariant checks, CSV persistence and a polars view
//! - A warning channel for data-quality problems that must not halt a build

pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod frame;
pub mod names;
pub mod table;

pub use diagnostics::{Diagnostics, Warning};
pub use domain::{CandidateDayRecord, ContestKey, Cycle, RecordKey};
pub use names::{NameRegistry, NameSource, RegistryError};
pub use table::{MasterTable, TableError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types handed between pipeline stages are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<CandidateDayRecord>();
        require_sync::<CandidateDayRecord>();
        require_send::<MasterTable>();
        require_sync::<MasterTable>();
        require_send::<NameRegistry>();
        require_sync::<NameRegistry>();
        require_send::<Diagnostics>();
        require_sync::<Diagnostics>();
        require_send::<data::DayTable>();
        require_sync::<data::DayTable>();
        require_send::<data::ContestDescriptor>();
        require_sync::<data::ContestDescriptor>();
    }
}
