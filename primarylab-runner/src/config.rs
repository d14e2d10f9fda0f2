//! TOML pipeline configuration.
//!
//! One file describes everything a build needs: which cycles to build, where
//! each cycle's poll, market and results inputs live, the ordered state list
//! for the market fold, per-contest results descriptors, and the lag range for
//! evaluation. Relative paths resolve against the config file's directory.
//!
//! ```toml
//! output = "out/master.csv"
//!
//! [evaluation]
//! min_lag = 1
//! max_lag = 30
//!
//! [[cycle]]
//! year = 2020
//! poll_file = "2020/polls.csv"
//! market_dir = "2020/markets"
//! states = ["Iowa", "New Hampshire"]
//!
//! [[cycle.contest]]
//! state = "Iowa"
//! source = "2020/results/iowa.html"
//! candidates = 5
//! columns = 3
//! selector = "table.results td"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use primarylab_core::data::{ContestDescriptor, DropoutTable};
use primarylab_core::{ContestKey, Cycle, NameRegistry, NameSource, RegistryError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cycle {0} is configured more than once")]
    DuplicateCycle(Cycle),

    #[error("cycle {cycle}: {reason}")]
    InvalidCycle { cycle: Cycle, reason: String },

    #[error("invalid lag range {min}..={max}")]
    InvalidLagRange { min: u32, max: u32 },

    #[error("alias error: {0}")]
    Alias(#[from] RegistryError),
}

/// Lag range for the accuracy sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_min_lag")]
    pub min_lag: u32,
    #[serde(default = "default_max_lag")]
    pub max_lag: u32,
    /// Restrict evaluation to these contests; all contests when absent.
    #[serde(default)]
    pub contests: Option<Vec<ContestKey>>,
}

fn default_min_lag() -> u32 {
    1
}

fn default_max_lag() -> u32 {
    30
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            min_lag: default_min_lag(),
            max_lag: default_max_lag(),
            contests: None,
        }
    }
}

impl EvaluationConfig {
    pub fn lags(&self) -> RangeInclusive<u32> {
        self.min_lag..=self.max_lag
    }

    pub fn eligible(&self) -> Option<BTreeSet<ContestKey>> {
        self.contests.as_ref().map(|c| c.iter().cloned().collect())
    }
}

/// Inputs for one primary season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    pub year: Cycle,
    pub poll_file: PathBuf,
    /// Race-identifier prefix for multi-cycle poll files.
    #[serde(default)]
    pub race: Option<String>,
    /// Directory holding one `<State>.csv` market file per state.
    pub market_dir: PathBuf,
    /// States to fold market data for, in order.
    pub states: Vec<String>,
    /// By-state results CSV (`state, name, vote_percent`); used instead of contest pages.
    #[serde(default)]
    pub results_csv: Option<PathBuf>,
    #[serde(default, rename = "contest")]
    pub contests: Vec<ContestDescriptor>,
    /// Withdrawal dates that replace or extend the built-in table.
    #[serde(default)]
    pub dropouts: BTreeMap<String, NaiveDate>,
}

impl CycleConfig {
    pub fn market_file(&self, state: &str) -> PathBuf {
        self.market_dir.join(format!("{state}.csv"))
    }

    pub fn dropout_table(&self) -> DropoutTable {
        let mut table = DropoutTable::builtin(self.year);
        for (name, date) in &self.dropouts {
            table.set(name, *date);
        }
        table
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCycle {
            cycle: self.year,
            reason,
        };
        if self.states.is_empty() {
            return Err(invalid("no states listed".into()));
        }
        if self.results_csv.is_some() && !self.contests.is_empty() {
            return Err(invalid(
                "set either results_csv or contest descriptors, not both".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for contest in &self.contests {
            if !seen.insert(contest.state.as_str()) {
                return Err(invalid(format!("contest {} listed twice", contest.state)));
            }
            contest
                .layout()
                .map_err(|e| invalid(e.to_string()))?;
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.poll_file = resolve(base, &self.poll_file);
        self.market_dir = resolve(base, &self.market_dir);
        if let Some(csv) = &self.results_csv {
            self.results_csv = Some(resolve(base, csv));
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Extra registry spellings, per source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasConfig {
    #[serde(default)]
    pub poll: BTreeMap<String, String>,
    #[serde(default)]
    pub market: BTreeMap<String, String>,
    #[serde(default)]
    pub results: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Where the master table CSV is written.
    pub output: PathBuf,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(rename = "cycle")]
    pub cycles: Vec<CycleConfig>,
    #[serde(default)]
    pub aliases: AliasConfig,
    /// Directory relative inputs resolve against (the config file's directory).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&content, base)
    }

    /// Parse, resolve relative paths against `base_dir`, and validate.
    pub fn from_toml(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: PipelineConfig = toml::from_str(content)?;
        config.base_dir = base_dir.to_path_buf();
        config.output = resolve(base_dir, &config.output);
        for cycle in &mut config.cycles {
            cycle.resolve_paths(base_dir);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut years = BTreeSet::new();
        for cycle in &self.cycles {
            if !years.insert(cycle.year) {
                return Err(ConfigError::DuplicateCycle(cycle.year));
            }
            cycle.validate()?;
        }
        if self.evaluation.min_lag > self.evaluation.max_lag {
            return Err(ConfigError::InvalidLagRange {
                min: self.evaluation.min_lag,
                max: self.evaluation.max_lag,
            });
        }
        Ok(())
    }

    /// Built-in registry extended with the configured aliases.
    pub fn registry(&self) -> Result<NameRegistry, ConfigError> {
        let mut registry = NameRegistry::builtin();
        let tables = [
            (NameSource::Poll, &self.aliases.poll),
            (NameSource::Market, &self.aliases.market),
            (NameSource::Results, &self.aliases.results),
        ];
        for (source, table) in tables {
            for (raw, canonical) in table {
                registry.add_alias(source, raw, canonical)?;
            }
        }
        registry.validate()?;
        Ok(registry)
    }
}
