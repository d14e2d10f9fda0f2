//! Canonical name registry.
//!
//! Every source spells candidates its own way: poll files use full names with
//! middle initials, market contracts use bare surnames, results pages use
//! legal names. The registry maps `(source, raw spelling)` to one canonical
//! "First Last" form that serves as the join key across sources.
//!
//! Unknown spellings pass through unchanged. Callers that care (the loaders)
//! use [`NameRegistry::normalize_reporting`] so the miss lands on the warning
//! channel instead of silently splitting a candidate in two.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::{Diagnostics, Warning};
use crate::domain::Cycle;

/// Which input a raw name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    Poll,
    Market,
    Results,
}

impl fmt::Display for NameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NameSource::Poll => "poll",
            NameSource::Market => "market",
            NameSource::Results => "results",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("{source_kind} alias '{raw}' maps to '{canonical}', which is not on any cycle roster")]
    UnknownCanonical {
        source_kind: NameSource,
        raw: String,
        canonical: String,
    },

    #[error("{source_kind} alias '{raw}' is already mapped to '{existing}'")]
    ConflictingAlias {
        source_kind: NameSource,
        raw: String,
        existing: String,
    },
}

const ROSTER_2016: &[&str] = &["Hillary Clinton", "Bernie Sanders", "Martin O'Malley"];

const ROSTER_2020: &[&str] = &[
    "Joe Biden",
    "Bernie Sanders",
    "Elizabeth Warren",
    "Pete Buttigieg",
    "Amy Klobuchar",
    "Michael Bloomberg",
    "Tom Steyer",
    "Tulsi Gabbard",
    "Andrew Yang",
    "Kamala Harris",
    "Cory Booker",
    "Michael Bennet",
    "Deval Patrick",
    "John Delaney",
    "Julian Castro",
    "Marianne Williamson",
    "Beto O'Rourke",
];

const POLL_SPELLINGS: &[(&str, &str)] = &[
    ("Hillary Rodham Clinton", "Hillary Clinton"),
    ("Martin J. O'Malley", "Martin O'Malley"),
    ("Bernard Sanders", "Bernie Sanders"),
    ("Joseph R. Biden Jr.", "Joe Biden"),
    ("Joseph R. Biden", "Joe Biden"),
    ("Pete Buttigieg", "Pete Buttigieg"),
    ("Michael Bloomberg", "Michael Bloomberg"),
    ("Michael R. Bloomberg", "Michael Bloomberg"),
    ("Thomas F. Steyer", "Tom Steyer"),
    ("Kamala D. Harris", "Kamala Harris"),
    ("Cory A. Booker", "Cory Booker"),
    ("Michael F. Bennet", "Michael Bennet"),
    ("John K. Delaney", "John Delaney"),
    ("Julián Castro", "Julian Castro"),
    ("Beto O'Rourke", "Beto O'Rourke"),
];

const MARKET_CONTRACTS: &[(&str, &str)] = &[
    ("Clinton", "Hillary Clinton"),
    ("O'Malley", "Martin O'Malley"),
    ("Sanders", "Bernie Sanders"),
    ("Biden", "Joe Biden"),
    ("Warren", "Elizabeth Warren"),
    ("Buttigieg", "Pete Buttigieg"),
    ("Klobuchar", "Amy Klobuchar"),
    ("Bloomberg", "Michael Bloomberg"),
    ("Steyer", "Tom Steyer"),
    ("Gabbard", "Tulsi Gabbard"),
    ("Yang", "Andrew Yang"),
    ("Harris", "Kamala Harris"),
    ("Booker", "Cory Booker"),
    ("Bennet", "Michael Bennet"),
    ("Patrick", "Deval Patrick"),
    ("Delaney", "John Delaney"),
    ("Castro", "Julian Castro"),
    ("Williamson", "Marianne Williamson"),
    ("O'Rourke", "Beto O'Rourke"),
];

const RESULTS_NAMES: &[(&str, &str)] = &[
    ("Hillary Rodham Clinton", "Hillary Clinton"),
    ("Bernard Sanders", "Bernie Sanders"),
    ("Joseph R. Biden", "Joe Biden"),
    ("Joseph R. Biden Jr.", "Joe Biden"),
    ("Elizabeth Ann Warren", "Elizabeth Warren"),
    ("Peter Buttigieg", "Pete Buttigieg"),
    ("Mike Bloomberg", "Michael Bloomberg"),
    ("Michael R. Bloomberg", "Michael Bloomberg"),
    ("Thomas Steyer", "Tom Steyer"),
    ("Tulsi Gabbard", "Tulsi Gabbard"),
    ("Michael F. Bennet", "Michael Bennet"),
    ("John K. Delaney", "John Delaney"),
    ("Julián Castro", "Julian Castro"),
    ("Marianne Williamson", "Marianne Williamson"),
];

/// Candidate roster for one cycle.
pub fn roster(cycle: Cycle) -> &'static [&'static str] {
    match cycle {
        Cycle::Y2016 => ROSTER_2016,
        Cycle::Y2020 => ROSTER_2020,
    }
}

fn is_canonical(name: &str) -> bool {
    Cycle::ALL.iter().any(|c| roster(*c).contains(&name))
}

fn fold_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Maps `(source, raw spelling)` to canonical candidate names.
#[derive(Debug, Clone)]
pub struct NameRegistry {
    aliases: HashMap<(NameSource, String), String>,
}

impl NameRegistry {
    /// Registry with no aliases; only canonical spellings resolve.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Registry loaded with the built-in tables for the 2016 and 2020 cycles.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        let tables = [
            (NameSource::Poll, POLL_SPELLINGS),
            (NameSource::Market, MARKET_CONTRACTS),
            (NameSource::Results, RESULTS_NAMES),
        ];
        for (source, table) in tables {
            for (raw, canonical) in table {
                registry
                    .aliases
                    .insert((source, fold_key(raw)), (*canonical).to_string());
            }
        }
        registry
    }

    /// Register an extra spelling. The target must be a rostered candidate.
    pub fn add_alias(
        &mut self,
        source: NameSource,
        raw: &str,
        canonical: &str,
    ) -> Result<(), RegistryError> {
        if !is_canonical(canonical) {
            return Err(RegistryError::UnknownCanonical {
                source_kind: source,
                raw: raw.to_string(),
                canonical: canonical.to_string(),
            });
        }
        let key = (source, fold_key(raw));
        if let Some(existing) = self.aliases.get(&key) {
            if existing != canonical {
                return Err(RegistryError::ConflictingAlias {
                    source_kind: source,
                    raw: raw.to_string(),
                    existing: existing.clone(),
                });
            }
        }
        self.aliases.insert(key, canonical.to_string());
        Ok(())
    }

    /// Check every mapping target against the cycle rosters.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut entries: Vec<_> = self.aliases.iter().collect();
        entries.sort();
        for ((source, raw), canonical) in entries {
            if !is_canonical(canonical) {
                return Err(RegistryError::UnknownCanonical {
                    source_kind: *source,
                    raw: raw.clone(),
                    canonical: canonical.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve a raw spelling, or `None` if the registry does not know it.
    pub fn lookup(&self, raw: &str, source: NameSource) -> Option<&str> {
        let key = fold_key(raw);
        if let Some(canonical) = self.aliases.get(&(source, key.clone())) {
            return Some(canonical.as_str());
        }
        Cycle::ALL
            .iter()
            .flat_map(|c| roster(*c).iter())
            .find(|name| fold_key(name) == key)
            .copied()
    }

    /// Canonical name for `raw`; unknown spellings pass through trimmed but otherwise unchanged.
    pub fn normalize(&self, raw: &str, source: NameSource) -> String {
        self.lookup(raw, source)
            .map(str::to_string)
            .unwrap_or_else(|| raw.trim().to_string())
    }

    /// Like [`normalize`](Self::normalize), but reports misses on the warning channel.
    pub fn normalize_reporting(
        &self,
        raw: &str,
        source: NameSource,
        diagnostics: &mut Diagnostics,
    ) -> String {
        match self.lookup(raw, source) {
            Some(canonical) => canonical.to_string(),
            None => {
                diagnostics.warn(Warning::UnmappedName {
                    source_kind: source,
                    raw: raw.trim().to_string(),
                });
                raw.trim().to_string()
            }
        }
    }

    pub fn is_rostered(&self, cycle: Cycle, name: &str) -> bool {
        roster(cycle).contains(&name)
    }
}

impl Default for NameRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
