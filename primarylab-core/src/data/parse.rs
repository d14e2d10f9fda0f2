//! Field parsers shared by the loaders.
//!
//! Each parser returns a plain reason string; the caller wraps it with the
//! file and row it came from.

use chrono::NaiveDate;
use csv::StringRecord;

use super::error::DataError;

/// Dates in source files are `MM/DD/YYYY`; leading zeros are optional.
pub fn parse_us_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y")
        .map_err(|e| format!("invalid date '{trimmed}' (expected MM/DD/YYYY): {e}"))
}

pub fn parse_f64(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid number '{trimmed}'"))
}

/// Empty cells are null; anything else must be a finite number.
pub fn parse_optional_f64(raw: &str) -> Result<Option<f64>, String> {
    if raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    parse_f64(raw).map(Some)
}

/// `"$0.37"` → 0.37. Digit-grouping commas are dropped too.
pub fn parse_currency(raw: &str) -> Result<f64, String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    parse_f64(&cleaned).map_err(|_| format!("invalid price '{}'", raw.trim()))
}

/// `"1,234,567"` → 1234567.
pub fn parse_grouped_count(raw: &str) -> Result<u64, String> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<u64>()
        .map_err(|_| format!("invalid count '{}'", raw.trim()))
}

/// `"48.5%"` or `"48.5"` (0–100 scale) → 0.485.
pub fn parse_percent(raw: &str) -> Result<f64, String> {
    let cleaned = raw.trim().trim_end_matches('%').trim();
    let value = parse_f64(cleaned).map_err(|_| format!("invalid percentage '{}'", raw.trim()))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("percentage '{}' outside 0-100", raw.trim()));
    }
    Ok(value / 100.0)
}

/// [`parse_percent`] with empty and `NA` cells read as null.
pub fn parse_optional_percent(raw: &str) -> Result<Option<f64>, String> {
    if raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    parse_percent(raw).map(Some)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Header lookup for one CSV file.
pub struct Columns<'a> {
    file: &'a str,
    headers: Vec<String>,
}

impl<'a> Columns<'a> {
    pub fn new(file: &'a str, headers: &StringRecord) -> Self {
        Self {
            file,
            headers: headers.iter().map(|h| h.trim().to_string()).collect(),
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    /// Index of the first header matching any of `names`.
    pub fn require_any(&self, names: &[&str]) -> Result<usize, DataError> {
        names
            .iter()
            .find_map(|n| self.find(n))
            .ok_or_else(|| DataError::MissingColumn {
                file: self.file.to_string(),
                column: names.join("|"),
            })
    }

    pub fn require(&self, name: &str) -> Result<usize, DataError> {
        self.require_any(&[name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_us_dates_with_and_without_padding() {
        let expected = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        assert_eq!(parse_us_date("03/01/2020"), Ok(expected));
        assert_eq!(parse_us_date("3/1/2020"), Ok(expected));
        assert!(parse_us_date("2020-03-01").is_err());
    }

    #[test]
    fn currency_strips_symbols() {
        assert_eq!(parse_currency("$0.37"), Ok(0.37));
        assert_eq!(parse_currency(" $1,000.50 "), Ok(1000.5));
        assert!(parse_currency("$").is_err());
    }

    #[test]
    fn grouped_counts_drop_commas() {
        assert_eq!(parse_grouped_count("1,234,567"), Ok(1_234_567));
        assert!(parse_grouped_count("12.5").is_err());
    }

    #[test]
    fn percent_text_becomes_fraction() {
        assert_eq!(parse_percent("48.5%"), Ok(0.485));
        assert!((parse_percent("20.1").unwrap() - 0.201).abs() < 1e-12);
        assert!(parse_percent("120%").is_err());
        assert!(parse_percent("n/a").is_err());
    }

    #[test]
    fn optional_numbers_treat_blank_as_null() {
        assert_eq!(parse_optional_f64(""), Ok(None));
        assert_eq!(parse_optional_f64("NA"), Ok(None));
        assert_eq!(parse_optional_f64("55.00"), Ok(Some(55.0)));
        assert!(parse_optional_f64("abc").is_err());
    }

    #[test]
    fn optional_percent_is_range_checked() {
        assert_eq!(parse_optional_percent(" "), Ok(None));
        assert_eq!(parse_optional_percent("55.00"), Ok(Some(0.55)));
        assert!(parse_optional_percent("120.0").is_err());
        assert!(parse_optional_percent("-1").is_err());
    }

    #[test]
    fn rounds_to_four_places() {
        assert_eq!(round_to(0.245_04, 4), 0.245);
        assert_eq!(round_to(24.5 / 100.0, 4), 0.245);
    }

    #[test]
    fn missing_column_names_the_file() {
        let headers = StringRecord::from(vec!["state", "modeldate"]);
        let cols = Columns::new("polls.csv", &headers);
        assert_eq!(cols.require("MODELDATE").unwrap(), 1);
        let err = cols.require_any(&["contestdate", "election_date"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "polls.csv: missing required column 'contestdate|election_date'"
        );
    }
}
