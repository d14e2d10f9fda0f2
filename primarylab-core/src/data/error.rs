use thiserror::Error;

/// Errors raised while reading and shaping source data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{file}: missing required column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("{file} row {row}: {reason}")]
    Parse {
        file: String,
        row: u64,
        reason: String,
    },

    #[error(
        "contest '{contest}': expected {expected} cells ({candidates} candidates x {columns} columns), found {found}"
    )]
    ShapeMismatch {
        contest: String,
        candidates: usize,
        columns: usize,
        expected: usize,
        found: usize,
    },

    #[error("contest '{contest}': invalid selector '{selector}': {reason}")]
    Selector {
        contest: String,
        selector: String,
        reason: String,
    },

    #[error("contest '{contest}': bad column layout: {reason}")]
    Layout { contest: String, reason: String },

    #[error("fetch {location} failed: {reason}")]
    Fetch { location: String, reason: String },
}
