//! Per-state summary tables and their CSV encoding.
//!
//! A [`ConditionTable`] holds one [`ConditionSummary`] per hidden state for a
//! single strategy pair. Utterance columns are discovered at runtime, so the
//! table is stored sparsely and zero-filled only when it is written out or
//! averaged.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::history::{ConditionSummary, UTTERANCE_PREFIX};
use crate::store::CacheKey;

const ROUNDS_COLUMN: &str = "n_rounds";
const STATE_COLUMN: &str = "trueState";

/// Summary of one hidden state's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRow {
    /// State identifier (`s0101`); empty when the cached file predates it
    pub true_state: String,
    pub summary: ConditionSummary,
}

/// One row per hidden state, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionTable {
    pub rows: Vec<ConditionRow>,
}

impl ConditionTable {
    pub fn new(rows: Vec<ConditionRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of utterance columns observed in any row.
    pub fn utterance_columns(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .flat_map(|row| row.summary.utterances.keys().cloned())
            .collect()
    }

    /// Mean rounds across all states (0 for an empty table).
    pub fn mean_rounds(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let total: u64 = self.rows.iter().map(|row| row.summary.n_rounds).sum();
        total as f64 / self.rows.len() as f64
    }

    /// Mean count per utterance column across all states.
    ///
    /// A state that never produced a column counts as zero for it, so every
    /// mean is taken over the full number of states.
    pub fn mean_utterances(&self) -> BTreeMap<String, f64> {
        let n = self.rows.len() as f64;
        self.utterance_columns()
            .into_iter()
            .map(|column| {
                let total: u64 = self.rows.iter().map(|row| row.summary.count(&column)).sum();
                (column, total as f64 / n)
            })
            .collect()
    }

    /// Encode as CSV, zero-filling missing utterance columns.
    ///
    /// The cache key's fields are written as informational columns.
    pub fn to_csv(&self, key: &CacheKey) -> String {
        let columns: Vec<String> = self.utterance_columns().into_iter().collect();

        let mut header = vec![String::new(), ROUNDS_COLUMN.to_string()];
        header.extend(columns.iter().cloned());
        header.extend(
            ["numPins", "numColors", "speakerStrategy", "listenerStrategy", STATE_COLUMN]
                .map(String::from),
        );

        let mut out = write_record(&header);
        for (index, row) in self.rows.iter().enumerate() {
            let mut fields = vec![index.to_string(), row.summary.n_rounds.to_string()];
            fields.extend(columns.iter().map(|c| row.summary.count(c).to_string()));
            fields.extend([
                key.num_pins.to_string(),
                key.num_colors.to_string(),
                key.config.speaker.to_string(),
                key.config.listener.to_string(),
                row.true_state.clone(),
            ]);
            out.push_str(&write_record(&fields));
        }
        out
    }

    /// Decode a table written by [`ConditionTable::to_csv`].
    ///
    /// Only `n_rounds`, `utt_*` and `trueState` are read; other columns are
    /// informational. Counts written as integral floats (`2.0`) are accepted.
    /// `origin` names the source in errors.
    pub fn from_csv(text: &str, origin: &str) -> Result<Self, TableError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header_line) = lines.next().ok_or_else(|| TableError::MissingHeader {
            origin: origin.to_string(),
        })?;
        let header = split_record(header_line).ok_or_else(|| TableError::UnterminatedQuote {
            origin: origin.to_string(),
            line: 1,
        })?;

        let rounds_ix = header
            .iter()
            .position(|name| name == ROUNDS_COLUMN)
            .ok_or_else(|| TableError::MissingColumn {
                origin: origin.to_string(),
                column: ROUNDS_COLUMN.to_string(),
            })?;
        let state_ix = header.iter().position(|name| name == STATE_COLUMN);
        let utterance_ixs: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, name)| name.starts_with(UTTERANCE_PREFIX))
            .map(|(ix, _)| ix)
            .collect();

        let mut rows = Vec::new();
        for (line_ix, line) in lines {
            let line_no = line_ix + 1;
            let fields = split_record(line).ok_or_else(|| TableError::UnterminatedQuote {
                origin: origin.to_string(),
                line: line_no,
            })?;
            if fields.len() != header.len() {
                return Err(TableError::RowWidth {
                    origin: origin.to_string(),
                    line: line_no,
                    expected: header.len(),
                    found: fields.len(),
                });
            }

            let parse = |ix: usize| {
                parse_count(&fields[ix]).ok_or_else(|| TableError::InvalidCount {
                    origin: origin.to_string(),
                    line: line_no,
                    column: header[ix].clone(),
                    value: fields[ix].clone(),
                })
            };

            let n_rounds = parse(rounds_ix)?;
            let mut utterances = BTreeMap::new();
            for &ix in &utterance_ixs {
                let count = parse(ix)?;
                // Zero cells are fill, not observations
                if count > 0 {
                    utterances.insert(header[ix].clone(), count);
                }
            }

            rows.push(ConditionRow {
                true_state: state_ix.map(|ix| fields[ix].clone()).unwrap_or_default(),
                summary: ConditionSummary {
                    n_rounds,
                    utterances,
                },
            });
        }

        Ok(Self { rows })
    }
}

/// Parse a non-negative count, tolerating integral float notation.
fn parse_count(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(count) = value.parse::<u64>() {
        return Some(count);
    }
    let float: f64 = value.parse().ok()?;
    (float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64).then_some(float as u64)
}

/// Format a float so it always carries a decimal point (`0.0`, `2.5`).
pub fn format_float(value: f64) -> String {
    format!("{:?}", value)
}

/// Join fields into one CSV line (with trailing newline), quoting as needed.
pub fn write_record<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|field| escape_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Split one CSV line into fields. Returns `None` on an unterminated quote.
pub fn split_record(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}
