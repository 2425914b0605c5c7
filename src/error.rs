use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("invalid rating {0}: expected a value from 1 to 5")]
    InvalidRating(u8),

    #[error("malformed scheduling state: {0}")]
    MalformedSchedulingState(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Row {
        path: PathBuf,
        line: u64,
        source: SchedulerError,
    },

    #[error("{path}:{line}: cannot parse {field}: {value:?}")]
    Parse {
        path: PathBuf,
        line: u64,
        field: &'static str,
        value: String,
    },
}
