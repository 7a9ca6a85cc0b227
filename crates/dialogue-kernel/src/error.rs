//! Error types for trace parsing, summary tables and configuration.

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// A simulator trace could not be turned into round records.
#[derive(Debug, Error)]
pub enum TraceError {
    /// A line had fewer whitespace tokens than the fixed offset requires.
    #[error(
        "round {round}, line {line}: expected token #{expected} but found {found} token(s) in {content:?}"
    )]
    MissingToken {
        round: usize,
        line: usize,
        /// 1-based token position that was required
        expected: usize,
        found: usize,
        content: String,
    },

    /// The belief-count token was not an integer.
    #[error("round {round}, line {line}: belief count {token:?} is not an integer")]
    InvalidBeliefCount {
        round: usize,
        line: usize,
        token: String,
        #[source]
        source: ParseIntError,
    },

    #[error("failed to read trace {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A cached per-state summary table is unreadable or corrupt.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to access table {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("table {origin} has no header row")]
    MissingHeader { origin: String },

    #[error("table {origin} has no {column:?} column")]
    MissingColumn { origin: String, column: String },

    #[error("table {origin}, line {line}: expected {expected} fields, found {found}")]
    RowWidth {
        origin: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("table {origin}, line {line}: column {column:?} holds {value:?}, expected a count")]
    InvalidCount {
        origin: String,
        line: usize,
        column: String,
        value: String,
    },

    #[error("table {origin}, line {line}: unterminated quoted field")]
    UnterminatedQuote { origin: String, line: usize },

    #[error("no table stored under {0}")]
    NotFound(String),
}

/// A sweep configuration is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("num_pins must be at least 1, got {0}")]
    InvalidPins(usize),

    #[error("num_colors must be between 2 and {max}, got {got}")]
    InvalidColors { got: usize, max: usize },

    #[error("{num_colors}^{num_pins} hidden states exceeds the limit of {max}")]
    TooManyStates {
        num_pins: usize,
        num_colors: usize,
        max: usize,
    },

    #[error("jobs must be at least 1")]
    InvalidJobs,

    #[error("timeout_secs must be at least 1; omit it to wait forever")]
    InvalidTimeout,

    #[error("runner program must not be empty")]
    EmptyRunner,

    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
