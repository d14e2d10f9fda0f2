//! Poll-average loader.
//!
//! Reads a cycle's polling-average CSV into [`DayRow`]s with no market fields.
//! Required columns: `state, candidate_name, modeldate, pct_estimate,
//! pct_trend_adjusted` and `contestdate` (or `election_date`). Historical
//! multi-cycle files carry a `race` column; pass `race` to keep only the rows
//! whose race identifier starts with it.
//!
//! Percentages arrive on a 0–100 scale and are stored as fractions; the
//! trend-adjusted fraction is rounded to 4 places. Any malformed field,
//! including a percentage outside 0–100, fails the whole file with the
//! offending row number.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::day_table::DayRow;
use super::error::DataError;
use super::parse::{parse_optional_percent, parse_us_date, round_to, Columns};
use crate::diagnostics::Diagnostics;
use crate::names::{NameRegistry, NameSource};

/// Load a poll-average file from disk.
pub fn load_polls(
    path: &Path,
    race: Option<&str>,
    registry: &NameRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<DayRow>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_polls(file, &path.display().to_string(), race, registry, diagnostics)
}

/// Parse poll-average CSV from any reader. `file` labels errors.
pub fn read_polls<R: Read>(
    reader: R,
    file: &str,
    race: Option<&str>,
    registry: &NameRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<DayRow>, DataError> {
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
    let state_idx = cols.require("state")?;
    let name_idx = cols.require("candidate_name")?;
    let model_idx = cols.require("modeldate")?;
    let estimate_idx = cols.require("pct_estimate")?;
    let trend_idx = cols.require("pct_trend_adjusted")?;
    let contest_idx = cols.require_any(&["contestdate", "election_date"])?;
    let race_idx = match race {
        Some(_) => Some(cols.require("race")?),
        None => None,
    };

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let parse_err = |reason: String| DataError::Parse {
            file: file.to_string(),
            row: line,
            reason,
        };

        if let (Some(prefix), Some(idx)) = (race, race_idx) {
            if !field(idx).starts_with(prefix) {
                continue;
            }
        }

        let date = parse_us_date(field(model_idx)).map_err(parse_err)?;
        let contest_date = parse_us_date(field(contest_idx)).map_err(parse_err)?;
        let estimate = parse_optional_percent(field(estimate_idx)).map_err(parse_err)?;
        let trend = parse_optional_percent(field(trend_idx)).map_err(parse_err)?;

        rows.push(DayRow {
            state: field(state_idx).to_string(),
            contest_date: Some(contest_date),
            name: registry.normalize_reporting(field(name_idx), NameSource::Poll, diagnostics),
            date,
            market_close: None,
            market_volume: None,
            poll_estimate: estimate,
            poll_trend_adjusted: trend.map(|share| round_to(share, 4)),
        });
    }

    tracing::debug!(file, rows = rows.len(), "loaded poll averages");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn read(csv: &str, race: Option<&str>) -> Result<Vec<DayRow>, DataError> {
        let mut diag = Diagnostics::new();
        read_polls(csv.as_bytes(), "polls.csv", race, &NameRegistry::builtin(), &mut diag)
    }

    #[test]
    fn sanders_row_is_canonicalized_and_rescaled() {
        let csv = "state,candidate_name,modeldate,pct_estimate,pct_trend_adjusted,contestdate\n\
                   Texas,Bernard Sanders,03/01/2020,25.00,24.50,03/03/2020\n";
        let rows = read(csv, None).unwrap();
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.name, "Bernie Sanders");
        assert_eq!(r.state, "Texas");
        assert_eq!(r.poll_estimate, Some(0.25));
        assert_eq!(r.poll_trend_adjusted, Some(0.245));
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert_eq!(r.contest_date, NaiveDate::from_ymd_opt(2020, 3, 3));
        assert_eq!(r.market_close, None);
    }

    #[test]
    fn fifty_five_percent_is_exactly_point_five_five() {
        let csv = "state,candidate_name,modeldate,pct_estimate,pct_trend_adjusted,contestdate\n\
                   Iowa,Joseph R. Biden Jr.,01/20/2020,55.00,55.00,02/03/2020\n";
        let rows = read(csv, None).unwrap();
        assert_eq!(rows[0].poll_estimate, Some(0.55));
        assert_eq!(rows[0].name, "Joe Biden");
    }

    #[test]
    fn race_filter_selects_cycle_and_accepts_election_date_alias() {
        let csv = "race,state,candidate_name,modeldate,pct_estimate,pct_trend_adjusted,election_date,comment\n\
                   2016D-IA,Iowa,Hillary Rodham Clinton,01/30/2016,48.0,47.5,02/01/2016,\n\
                   2008D-IA,Iowa,Hillary Rodham Clinton,01/01/2008,30.0,29.0,01/03/2008,old\n";
        let rows = read(csv, Some("2016D")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Hillary Clinton");
    }

    #[test]
    fn blank_percentages_load_as_null() {
        let csv = "state,candidate_name,modeldate,pct_estimate,pct_trend_adjusted,contestdate\n\
                   Iowa,Andrew Yang,01/20/2020,,3.1,02/03/2020\n";
        let rows = read(csv, None).unwrap();
        assert_eq!(rows[0].poll_estimate, None);
        assert_eq!(rows[0].poll_trend_adjusted, Some(0.031));
    }

    #[test]
    fn malformed_date_names_file_and_row() {
        let csv = "state,candidate_name,modeldate,pct_estimate,pct_trend_adjusted,contestdate\n\
                   Iowa,Andrew Yang,01/20/2020,3.0,3.1,02/03/2020\n\
                   Iowa,Andrew Yang,2020-01-21,3.0,3.1,02/03/2020\n";
        match read(csv, None).unwrap_err() {
            DataError::Parse { file, row, reason } => {
                assert_eq!(file, "polls.csv");
                assert_eq!(row, 3);
                assert!(reason.contains("2020-01-21"));
            }
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn estimate_above_one_hundred_fails_with_row() {
        let csv = "state,candidate_name,modeldate,pct_estimate,pct_trend_adjusted,contestdate\n\
                   Iowa,Andrew Yang,01/20/2020,120.0,3.1,02/03/2020\n";
        match read(csv, None).unwrap_err() {
            DataError::Parse { file, row, reason } => {
                assert_eq!(file, "polls.csv");
                assert_eq!(row, 2);
                assert!(reason.contains("outside 0-100"));
            }
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn negative_trend_fails() {
        let csv = "state,candidate_name,modeldate,pct_estimate,pct_trend_adjusted,contestdate\n\
                   Iowa,Andrew Yang,01/20/2020,3.0,-0.5,02/03/2020\n";
        assert!(matches!(read(csv, None).unwrap_err(), DataError::Parse { .. }));
    }

    #[test]
    fn missing_column_fails() {
        let csv = "state,candidate_name,modeldate,pct_estimate,contestdate\n";
        assert!(matches!(
            read(csv, None).unwrap_err(),
            DataError::MissingColumn { column, .. } if column == "pct_trend_adjusted"
        ));
    }

    #[test]
    fn unmapped_names_reach_the_warning_channel() {
        let csv = "state,candidate_name,modeldate,pct_estimate,pct_trend_adjusted,contestdate\n\
                   Iowa,Zed Nobody,01/20/2020,1.0,1.0,02/03/2020\n";
        let mut diag = Diagnostics::new();
        let rows =
            read_polls(csv.as_bytes(), "polls.csv", None, &NameRegistry::builtin(), &mut diag)
                .unwrap();
        assert_eq!(rows[0].name, "Zed Nobody");
        assert_eq!(diag.len(), 1);
    }
}
