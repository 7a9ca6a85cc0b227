//! Parser for the simulator's round-by-round trace.
//!
//! ## Grammar
//!
//! The trace is a flat list of `\n`-separated lines read in groups of three,
//! one group per round:
//!
//! ```text
//! <t0> <t1> <t2> <t3> <belief-count> ...    belief count is token 5
//! <t0> <t1> <prediction> ...                prediction is token 3
//! <t0> <t1> <utterance> ...                 utterance is token 3
//! ```
//!
//! Exactly `lines / 3` groups are read. A trailing partial group (one or two
//! lines, including the empty line after a final newline) is dropped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TraceError;

/// Lines emitted per simulated round.
pub const LINES_PER_ROUND: usize = 3;

/// 0-based token offsets within each line of a round group.
const BELIEF_TOKEN: usize = 4;
const PREDICTION_TOKEN: usize = 2;
const UTTERANCE_TOKEN: usize = 2;

/// One simulated round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number
    pub round: usize,
    /// Number of states the listener still considers plausible
    pub n_beliefs: u64,
    /// Listener's current best guess
    pub prediction: String,
    /// Utterance the speaker produced this round
    pub utterance: String,
}

/// Parse a full trace into ordered round records.
pub fn parse_trace(log: &str) -> Result<Vec<RoundRecord>, TraceError> {
    let lines: Vec<&str> = log.split('\n').collect();
    let groups = lines.len() / LINES_PER_ROUND;

    let leftover = &lines[groups * LINES_PER_ROUND..];
    if leftover.iter().any(|line| !line.trim().is_empty()) {
        warn!(
            dropped_lines = leftover.len(),
            rounds = groups,
            "Trace ends with a partial round; dropping it"
        );
    }

    (0..groups)
        .map(|ix| -> Result<RoundRecord, TraceError> {
            let base = ix * LINES_PER_ROUND;
            let round = ix + 1;

            let belief_token = token(lines[base], BELIEF_TOKEN, round, base)?;
            let n_beliefs = belief_token.parse::<u64>().map_err(|source| {
                TraceError::InvalidBeliefCount {
                    round,
                    line: base + 1,
                    token: belief_token.to_string(),
                    source,
                }
            })?;

            Ok(RoundRecord {
                round,
                n_beliefs,
                prediction: token(lines[base + 1], PREDICTION_TOKEN, round, base + 1)?.to_string(),
                utterance: token(lines[base + 2], UTTERANCE_TOKEN, round, base + 2)?.to_string(),
            })
        })
        .collect()
}

/// Read and parse a saved trace file.
pub fn parse_trace_file(path: impl AsRef<Path>) -> Result<Vec<RoundRecord>, TraceError> {
    let path = path.as_ref();
    let log = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_trace(&log)
}

/// Fetch the whitespace token at `index` from the 0-based line `line_ix`.
fn token(line: &str, index: usize, round: usize, line_ix: usize) -> Result<&str, TraceError> {
    let mut tokens = line.split_whitespace();
    tokens.nth(index).ok_or_else(|| TraceError::MissingToken {
        round,
        line: line_ix + 1,
        expected: index + 1,
        found: line.split_whitespace().count(),
        content: line.to_string(),
    })
}
