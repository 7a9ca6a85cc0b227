//! Condense a simulated run into round and utterance counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::trace::RoundRecord;

/// Column prefix for utterance counts, so tables from different runs align
/// their columns by name.
pub const UTTERANCE_PREFIX: &str = "utt_";

/// Run statistics for one hidden state under one strategy pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSummary {
    /// Rounds until the simulator stopped
    pub n_rounds: u64,
    /// Occurrences per utterance column (`utt_<token>`), sorted by column name
    pub utterances: BTreeMap<String, u64>,
}

impl ConditionSummary {
    /// Count for an utterance column; absent columns count zero.
    pub fn count(&self, column: &str) -> u64 {
        self.utterances.get(column).copied().unwrap_or(0)
    }

    /// Count for a bare utterance token such as `"none"`.
    pub fn token_count(&self, token: &str) -> u64 {
        self.count(&utterance_column(token))
    }
}

/// Column name for an utterance token.
pub fn utterance_column(token: &str) -> String {
    format!("{}{}", UTTERANCE_PREFIX, token)
}

/// Reduce a run to its summary.
pub fn condense(rounds: &[RoundRecord]) -> ConditionSummary {
    let mut utterances = BTreeMap::new();
    for record in rounds {
        *utterances
            .entry(utterance_column(&record.utterance))
            .or_insert(0) += 1;
    }

    ConditionSummary {
        n_rounds: rounds.len() as u64,
        utterances,
    }
}
