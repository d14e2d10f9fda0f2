//! Source loaders, merges and filters

pub mod day_table;
pub mod dropout;
pub mod error;
pub mod fetch;
pub mod market;
pub mod parse;
pub mod poll;
pub mod results;

pub use day_table::{DayKey, DayRow, DayTable};
pub use dropout::{apply_dropouts, DropoutTable};
pub use error::DataError;
pub use fetch::{BlockingFetcher, DocumentFetcher, DocumentLocation};
pub use market::{fold_markets, load_market_file, merge_market, read_market, MarketQuote};
pub use poll::{load_polls, read_polls};
pub use results::{
    apply_results, attach_contest_results, extract_results, load_results_csv, read_results_csv,
    ContestDescriptor, ContestResult, EveResult, MissingResults, ResultColumn, ResultsLedger,
};
