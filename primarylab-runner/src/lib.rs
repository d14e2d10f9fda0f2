//! Primarylab Runner — configuration, build orchestration, evaluation.
//!
//! This crate builds on `primarylab-core` to provide:
//! - TOML pipeline configuration with path resolution and alias extensions
//! - The primary builder that folds loaders per cycle into the master table
//! - The lag-based accuracy evaluator and vote-share error
//! - CSV/JSON export of evaluation output

pub mod builder;
pub mod config;
pub mod evaluator;
pub mod export;

pub use builder::{build_from_config, BuildError, BuildOutput, PrimaryBuilder};
pub use config::{AliasConfig, ConfigError, CycleConfig, EvaluationConfig, PipelineConfig};
pub use evaluator::{
    contest_snapshots, evaluate, evaluate_range, min_rank_desc, vote_share_error,
    ContestSnapshot, EvaluationSnapshot, RankedCandidate, VoteShareError, VIABLE_THRESHOLD,
};
pub use export::{
    export_contests_csv, export_snapshots_csv, export_snapshots_json, export_warnings_json,
    save_snapshots, write_file,
};
