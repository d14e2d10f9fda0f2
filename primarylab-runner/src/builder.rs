//! Primary builder: turns one config into the master table.
//!
//! Per cycle the stages run strictly in order:
//! polls → market fold over states → integration → dropout filter →
//! results fold over contests → winner attachment. Cycles are then unioned,
//! checked, validated through the polars frame, and fingerprinted.
//!
//! State and contest failures are isolated: they become warnings and the
//! accumulator moves on unchanged. A missing poll file or results CSV fails
//! the build.

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use primarylab_core::data::{
    apply_dropouts, apply_results, attach_contest_results, extract_results, fold_markets,
    load_market_file, load_polls, load_results_csv, BlockingFetcher, ContestDescriptor,
    DataError, DayTable, DocumentFetcher, DocumentLocation, MissingResults, ResultsLedger,
};
use primarylab_core::frame::{self, FrameError};
use primarylab_core::{
    CandidateDayRecord, Cycle, Diagnostics, MasterTable, NameRegistry, TableError, Warning,
};

use crate::config::{ConfigError, CycleConfig, PipelineConfig};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("cycle {cycle}: {source}")]
    Data {
        cycle: Cycle,
        #[source]
        source: DataError,
    },

    #[error("fetcher setup failed: {0}")]
    Fetcher(DataError),

    #[error("table error: {0}")]
    Table(#[from] TableError),

    #[error("frame validation failed: {0}")]
    Frame(#[from] FrameError),
}

/// A finished build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub table: MasterTable,
    pub warnings: Vec<Warning>,
    /// BLAKE3 hash of the table's CSV rendering.
    pub fingerprint: String,
}

pub struct PrimaryBuilder<'a> {
    registry: &'a NameRegistry,
    fetcher: &'a dyn DocumentFetcher,
}

impl<'a> PrimaryBuilder<'a> {
    pub fn new(registry: &'a NameRegistry, fetcher: &'a dyn DocumentFetcher) -> Self {
        Self { registry, fetcher }
    }

    /// Build every configured cycle and union them into the master table.
    pub fn build(&self, config: &PipelineConfig) -> Result<BuildOutput, BuildError> {
        let mut diagnostics = Diagnostics::new();
        let mut cycles = Vec::with_capacity(config.cycles.len());
        for cycle in &config.cycles {
            cycles.push(self.build_cycle(cycle, &config.base_dir, &mut diagnostics)?);
        }

        let table = MasterTable::union(cycles)?;
        table.check_invariants()?;
        let report = frame::validate(table.records())?;
        let fingerprint = table.fingerprint()?;

        tracing::info!(
            rows = report.rows,
            contests = table.contests().len(),
            warnings = diagnostics.len(),
            %fingerprint,
            "master table built"
        );

        Ok(BuildOutput {
            table,
            warnings: diagnostics.into_warnings(),
            fingerprint,
        })
    }

    /// Build one cycle's records. `base_dir` resolves relative contest sources.
    pub fn build_cycle(
        &self,
        cycle: &CycleConfig,
        base_dir: &Path,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<CandidateDayRecord>, BuildError> {
        let data_err = |source| BuildError::Data {
            cycle: cycle.year,
            source,
        };

        let polls = load_polls(
            &cycle.poll_file,
            cycle.race.as_deref(),
            self.registry,
            diagnostics,
        )
        .map_err(data_err)?;
        tracing::info!(cycle = %cycle.year, rows = polls.len(), "polls loaded");

        let table = fold_markets(
            DayTable::from_polls(polls),
            &cycle.states,
            diagnostics,
            |state, diag| load_market_file(&cycle.market_file(state), state, self.registry, diag),
        );
        tracing::debug!(cycle = %cycle.year, rows = table.len(), "markets merged");

        let integrated = table.into_records(cycle.year);
        let records = apply_dropouts(integrated, &cycle.dropout_table());
        tracing::info!(cycle = %cycle.year, rows = records.len(), "integrated and dropout-filtered");

        let (ledger, missing) = match &cycle.results_csv {
            Some(path) => {
                let by_state =
                    load_results_csv(path, self.registry, diagnostics).map_err(data_err)?;
                let ledger = by_state
                    .iter()
                    .fold(ResultsLedger::new(), |acc, (state, results)| {
                        attach_contest_results(acc, &records, state, results)
                    });
                (ledger, MissingResults::NotWinner)
            }
            None => {
                let ledger = self.fold_contests(&records, &cycle.contests, base_dir, diagnostics);
                (ledger, MissingResults::Null)
            }
        };
        report_unmatched_leaders(&ledger, diagnostics);
        tracing::info!(
            cycle = %cycle.year,
            contests = ledger.states().len(),
            "results attached"
        );

        let records = apply_results(records, &ledger, missing);
        self.report_unrostered(cycle.year, &records, diagnostics);
        Ok(records)
    }

    /// Fold extraction over contest descriptors in order.
    ///
    /// A contest that cannot be fetched or extracted is skipped with
    /// [`Warning::ContestFailed`].
    pub fn fold_contests(
        &self,
        records: &[CandidateDayRecord],
        contests: &[ContestDescriptor],
        base_dir: &Path,
        diagnostics: &mut Diagnostics,
    ) -> ResultsLedger {
        contests.iter().fold(ResultsLedger::new(), |acc, descriptor| {
            let location = DocumentLocation::parse(&descriptor.source, Some(base_dir));
            let extracted = self
                .fetcher
                .fetch(&location)
                .and_then(|html| extract_results(&html, descriptor, self.registry, diagnostics));
            match extracted {
                Ok(results) => attach_contest_results(acc, records, &descriptor.state, &results),
                Err(e) => {
                    diagnostics.warn(Warning::ContestFailed {
                        state: descriptor.state.clone(),
                        reason: e.to_string(),
                    });
                    acc
                }
            }
        })
    }

    fn report_unrostered(
        &self,
        cycle: Cycle,
        records: &[CandidateDayRecord],
        diagnostics: &mut Diagnostics,
    ) {
        let names: BTreeSet<&str> = records.iter().map(|r| r.candidate_name.as_str()).collect();
        for name in names {
            if !self.registry.is_rostered(cycle, name) {
                diagnostics.warn(Warning::UnrosteredName {
                    cycle,
                    name: name.to_string(),
                });
            }
        }
    }
}

/// Warn for each contest whose rank-1 candidate had no contest-eve row.
fn report_unmatched_leaders(ledger: &ResultsLedger, diagnostics: &mut Diagnostics) {
    for (state, leader) in ledger.unmatched_leaders() {
        diagnostics.warn(Warning::ContestFailed {
            state: state.to_string(),
            reason: format!("winner {leader} has no contest-eve row"),
        });
    }
}

/// Build from a config with its registry and a blocking fetcher.
pub fn build_from_config(config: &PipelineConfig) -> Result<BuildOutput, BuildError> {
    let registry = config.registry()?;
    let fetcher = BlockingFetcher::new().map_err(BuildError::Fetcher)?;
    PrimaryBuilder::new(&registry, &fetcher).build(config)
}
