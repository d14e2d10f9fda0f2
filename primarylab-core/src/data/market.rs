//! Prediction-market loader and the poll/market merge.
//!
//! One file per state, with daily contract quotes:
//! `ContractName, Date, OpenSharePrice, HighSharePrice, LowSharePrice,
//! CloseSharePrice, TradeVolume`. Prices are currency strings (`"$0.37"`).
//! Only the close and the volume are kept.
//!
//! The merge is a full outer join on `(state, date, name)`:
//! - a key present on both sides takes the incoming market value, keeping the
//!   existing one only when the incoming value is absent;
//! - a market-only key becomes a new row with no poll fields;
//! - poll-only keys are left untouched.
//!
//! The merge is pure and idempotent, and because states never share keys the
//! order of the state fold does not change the result.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;

use super::day_table::{DayKey, DayRow, DayTable};
use super::error::DataError;
use super::parse::{parse_currency, parse_grouped_count, parse_us_date, Columns};
use crate::diagnostics::{Diagnostics, Warning};
use crate::names::{NameRegistry, NameSource};

/// One day's closing quote for one candidate contract in one state.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuote {
    pub state: String,
    pub contract: String,
    pub name: String,
    pub date: NaiveDate,
    pub close: f64,
    pub volume: Option<u64>,
}

impl MarketQuote {
    pub fn key(&self) -> DayKey {
        DayKey {
            state: self.state.clone(),
            date: self.date,
            name: self.name.clone(),
        }
    }
}

/// Load one state's market file from disk.
pub fn load_market_file(
    path: &Path,
    state: &str,
    registry: &NameRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<MarketQuote>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_market(file, &path.display().to_string(), state, registry, diagnostics)
}

/// Parse one state's market CSV. Malformed rows are skipped with a warning;
/// a missing column fails the file.
pub fn read_market<R: Read>(
    reader: R,
    file: &str,
    state: &str,
    registry: &NameRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<MarketQuote>, DataError> {
    let csv_err = |source| DataError::Csv {
        file: file.to_string(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let cols = Columns::new(file, &headers);
    let contract_idx = cols.require("ContractName")?;
    let date_idx = cols.require("Date")?;
    let close_idx = cols.require("CloseSharePrice")?;
    let volume_idx = cols.require("TradeVolume")?;

    let mut quotes = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let parsed = parse_us_date(field(date_idx)).and_then(|date| {
            let close = parse_currency(field(close_idx))?;
            if !(0.0..=1.0).contains(&close) {
                return Err(format!("close price {close} outside 0-1"));
            }
            let volume = match field(volume_idx) {
                "" => None,
                raw => Some(parse_grouped_count(raw)?),
            };
            Ok((date, close, volume))
        });

        let (date, close, volume) = match parsed {
            Ok(values) => values,
            Err(reason) => {
                diagnostics.warn(Warning::SkippedRow {
                    file: file.to_string(),
                    row: line,
                    reason,
                });
                continue;
            }
        };

        let contract = field(contract_idx).to_string();
        quotes.push(MarketQuote {
            state: state.to_string(),
            name: registry.normalize_reporting(&contract, NameSource::Market, diagnostics),
            contract,
            date,
            close,
            volume,
        });
    }

    tracing::debug!(file, state, quotes = quotes.len(), "loaded market quotes");
    Ok(quotes)
}

/// Full outer join of `quotes` into `table`.
pub fn merge_market(mut table: DayTable, quotes: &[MarketQuote]) -> DayTable {
    for quote in quotes {
        let key = quote.key();
        match table.get_mut(&key) {
            Some(row) => {
                row.market_close = Some(quote.close);
                row.market_volume = quote.volume.or(row.market_volume);
            }
            None => table.upsert(DayRow {
                state: quote.state.clone(),
                contest_date: None,
                name: quote.name.clone(),
                date: quote.date,
                market_close: Some(quote.close),
                market_volume: quote.volume,
                poll_estimate: None,
                poll_trend_adjusted: None,
            }),
        }
    }
    table
}

/// Fold [`merge_market`] over states in the given order.
///
/// `load` is called once per state. A state whose load fails leaves the
/// accumulator as it was and is reported as [`Warning::StateFailed`].
pub fn fold_markets<F>(
    table: DayTable,
    states: &[String],
    diagnostics: &mut Diagnostics,
    mut load: F,
) -> DayTable
where
    F: FnMut(&str, &mut Diagnostics) -> Result<Vec<MarketQuote>, DataError>,
{
    states.iter().fold(table, |acc, state| {
        match load(state, diagnostics) {
            Ok(quotes) => merge_market(acc, &quotes),
            Err(e) => {
                diagnostics.warn(Warning::StateFailed {
                    state: state.clone(),
                    reason: e.to_string(),
                });
                acc
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXAS: &str = "ContractName,Date,OpenSharePrice,HighSharePrice,LowSharePrice,CloseSharePrice,TradeVolume\n\
                         Biden,03/02/2020,$0.30,$0.40,$0.29,$0.37,120\n\
                         Sanders,03/02/2020,$0.60,$0.65,$0.55,$0.58,\"1,050\"\n";

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, day).unwrap()
    }

    fn read(csv: &str, state: &str, diag: &mut Diagnostics) -> Vec<MarketQuote> {
        read_market(csv.as_bytes(), "Texas.csv", state, &NameRegistry::builtin(), diag).unwrap()
    }

    fn poll_row(name: &str, date: NaiveDate) -> DayRow {
        DayRow {
            state: "Texas".into(),
            contest_date: Some(d(3, 3)),
            name: name.into(),
            date,
            market_close: None,
            market_volume: None,
            poll_estimate: Some(0.3),
            poll_trend_adjusted: Some(0.3),
        }
    }

    #[test]
    fn parses_currency_and_volume() {
        let mut diag = Diagnostics::new();
        let quotes = read(TEXAS, "Texas", &mut diag);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].name, "Joe Biden");
        assert_eq!(quotes[0].close, 0.37);
        assert_eq!(quotes[0].volume, Some(120));
        assert_eq!(quotes[0].state, "Texas");
        assert_eq!(quotes[1].volume, Some(1050));
        assert!(diag.is_empty());
    }

    #[test]
    fn biden_quote_merges_onto_poll_row() {
        let mut diag = Diagnostics::new();
        let quotes = read(TEXAS, "Texas", &mut diag);
        let table = DayTable::from_polls(vec![poll_row("Joe Biden", d(3, 2))]);

        let merged = merge_market(table, &quotes);
        let key = DayKey {
            state: "Texas".into(),
            date: d(3, 2),
            name: "Joe Biden".into(),
        };
        let row = merged.get(&key).unwrap();
        assert_eq!(row.name, "Joe Biden");
        assert_eq!(row.market_close, Some(0.37));
        assert_eq!(row.market_volume, Some(120));
        assert_eq!(row.state, "Texas");
        assert_eq!(row.poll_estimate, Some(0.3));
        // Sanders has no poll row: the outer join keeps him market-only.
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut diag = Diagnostics::new();
        let quotes = read(TEXAS, "Texas", &mut diag);
        let table = DayTable::from_polls(vec![poll_row("Joe Biden", d(3, 2))]);

        let once = merge_market(table, &quotes);
        let twice = merge_market(once.clone(), &quotes);
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_incoming_volume_keeps_existing() {
        let mut row = poll_row("Joe Biden", d(3, 2));
        row.market_close = Some(0.2);
        row.market_volume = Some(99);
        let table = DayTable::from_polls(vec![row]);
        let quote = MarketQuote {
            state: "Texas".into(),
            contract: "Biden".into(),
            name: "Joe Biden".into(),
            date: d(3, 2),
            close: 0.37,
            volume: None,
        };

        let merged = merge_market(table, &[quote]);
        let row = merged.rows().next().unwrap();
        assert_eq!(row.market_close, Some(0.37));
        assert_eq!(row.market_volume, Some(99));
    }

    #[test]
    fn malformed_rows_are_skipped_with_warning() {
        let csv = "ContractName,Date,OpenSharePrice,HighSharePrice,LowSharePrice,CloseSharePrice,TradeVolume\n\
                   Biden,03/02/2020,$0.30,$0.40,$0.29,n/a,120\n\
                   Biden,03/01/2020,$0.30,$0.40,$0.29,$0.31,80\n";
        let mut diag = Diagnostics::new();
        let quotes = read(csv, "Texas", &mut diag);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].date, d(3, 1));
        assert!(matches!(diag.warnings()[0], Warning::SkippedRow { row: 2, .. }));
    }

    #[test]
    fn prices_above_one_dollar_are_skipped() {
        let csv = "ContractName,Date,OpenSharePrice,HighSharePrice,LowSharePrice,CloseSharePrice,TradeVolume\n\
                   Sanders,03/02/2020,$0.90,$1.10,$0.90,$1.05,10\n";
        let mut diag = Diagnostics::new();
        assert!(read(csv, "Texas", &mut diag).is_empty());
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn fold_order_does_not_change_content() {
        let texas = TEXAS.to_string();
        let iowa = "ContractName,Date,OpenSharePrice,HighSharePrice,LowSharePrice,CloseSharePrice,TradeVolume\n\
                    Buttigieg,02/02/2020,$0.20,$0.30,$0.19,$0.25,300\n"
            .to_string();
        let load = |state: &str, diag: &mut Diagnostics| {
            let csv = if state == "Texas" { &texas } else { &iowa };
            read_market(csv.as_bytes(), state, state, &NameRegistry::builtin(), diag)
        };

        let mut diag = Diagnostics::new();
        let forward = fold_markets(
            DayTable::new(),
            &["Texas".into(), "Iowa".into()],
            &mut diag,
            load,
        );
        let backward = fold_markets(
            DayTable::new(),
            &["Iowa".into(), "Texas".into()],
            &mut diag,
            load,
        );
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 3);
    }

    #[test]
    fn failing_state_is_isolated() {
        let mut diag = Diagnostics::new();
        let seeded = DayTable::from_polls(vec![poll_row("Joe Biden", d(3, 2))]);
        let result = fold_markets(
            seeded.clone(),
            &["Atlantis".into()],
            &mut diag,
            |state, _| {
                Err(DataError::MissingColumn {
                    file: format!("{state}.csv"),
                    column: "Date".into(),
                })
            },
        );
        assert_eq!(result, seeded);
        assert!(matches!(&diag.warnings()[0], Warning::StateFailed { state, .. } if state == "Atlantis"));
    }
}
