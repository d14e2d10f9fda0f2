//! Warning channel for data-quality problems.
//!
//! Loaders and the builder push warnings here instead of failing: an unmapped
//! spelling, a malformed market row, or one bad results page must not take
//! the rest of the cycle down with it. Every warning is also logged.

use std::fmt;

use serde::Serialize;

use crate::domain::Cycle;
use crate::names::NameSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The registry had no mapping for a spelling; it passed through unchanged.
    UnmappedName { source_kind: NameSource, raw: String },
    /// A name in the built table is not on the cycle's roster.
    UnrosteredName { cycle: Cycle, name: String },
    /// A loader dropped one malformed row.
    SkippedRow {
        file: String,
        row: u64,
        reason: String,
    },
    /// A state's market file could not be folded in.
    StateFailed { state: String, reason: String },
    /// A contest's results could not be extracted or attached.
    ContestFailed { state: String, reason: String },
}

impl Warning {
    fn dedupes(&self) -> bool {
        matches!(
            self,
            Warning::UnmappedName { .. } | Warning::UnrosteredName { .. }
        )
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnmappedName { source_kind, raw } => {
                write!(f, "unmapped {source_kind} name '{raw}'")
            }
            Warning::UnrosteredName { cycle, name } => {
                write!(f, "'{name}' is not on the {cycle} roster")
            }
            Warning::SkippedRow { file, row, reason } => {
                write!(f, "skipped {file} row {row}: {reason}")
            }
            Warning::StateFailed { state, reason } => {
                write!(f, "market data for {state} not merged: {reason}")
            }
            Warning::ContestFailed { state, reason } => {
                write!(f, "results for {state} not attached: {reason}")
            }
        }
    }
}

/// Collects warnings raised during a build.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning. Name warnings are kept once per distinct spelling.
    pub fn warn(&mut self, warning: Warning) {
        if warning.dedupes() && self.warnings.contains(&warning) {
            return;
        }
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_warnings_are_deduplicated() {
        let mut diag = Diagnostics::new();
        for _ in 0..3 {
            diag.warn(Warning::UnmappedName {
                source_kind: NameSource::Market,
                raw: "Trump".into(),
            });
        }
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn row_warnings_are_kept_individually() {
        let mut diag = Diagnostics::new();
        for row in [2, 2] {
            diag.warn(Warning::SkippedRow {
                file: "Iowa.csv".into(),
                row,
                reason: "bad price".into(),
            });
        }
        assert_eq!(diag.len(), 2);
    }

    #[test]
    fn display_names_the_problem() {
        let w = Warning::ContestFailed {
            state: "Nevada".into(),
            reason: "shape mismatch".into(),
        };
        assert_eq!(w.to_string(), "results for Nevada not attached: shape mismatch");
    }
}
