//! Dialogue Kernel: the deterministic core of a speaker/listener strategy sweep.
//!
//! An external simulator plays a Mastermind-style reference game: a speaker
//! describes a hidden state, a listener narrows its beliefs until it guesses
//! the state. This crate owns everything about that loop that does not
//! involve launching the simulator:
//!
//! - enumerating every hidden state for a (pins, colors) board
//! - the four speaker/listener strategies and their pairings
//! - parsing the simulator's three-lines-per-round trace
//! - condensing a run into round and utterance counts
//! - per-state summary tables, their CSV encoding and the on-disk cache
//!
//! The crate does no I/O except through [`store::SummaryStore`] and the
//! trace/config file helpers.

pub mod config;
pub mod error;
pub mod history;
pub mod state;
pub mod store;
pub mod strategy;
pub mod table;
pub mod trace;

pub use config::{ConfigOverrides, SweepConfig};
pub use error::{ConfigError, TableError, TraceError};
pub use history::{condense, ConditionSummary, UTTERANCE_PREFIX};
pub use state::{enumerate_states, state_count, GameState};
pub use store::{CacheKey, CsvStore, MemoryStore, SummaryStore};
pub use strategy::{Strategy, StrategyConfig};
pub use table::{format_float, ConditionRow, ConditionTable};
pub use trace::{parse_trace, parse_trace_file, RoundRecord};
