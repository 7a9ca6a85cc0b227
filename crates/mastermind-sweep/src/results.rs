//! Results collection and output for strategy sweeps.
//!
//! Captures, per speaker/listener pairing:
//! - mean rounds until the simulator stopped
//! - mean count of every utterance token observed anywhere in the sweep

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dialogue_kernel::table::write_record;
use dialogue_kernel::{format_float, ConditionTable, Strategy, StrategyConfig};

/// Prefix added to utterance columns in the sweep table.
pub const MEAN_PREFIX: &str = "mean_";

/// Statistics for one strategy pair, averaged over every hidden state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySweepRow {
    #[serde(rename = "speakerStrategy")]
    pub speaker: Strategy,
    #[serde(rename = "listenerStrategy")]
    pub listener: Strategy,
    #[serde(rename = "numPins")]
    pub num_pins: usize,
    #[serde(rename = "numColors")]
    pub num_colors: usize,
    /// Number of hidden states averaged over
    pub states: usize,
    pub mean_rounds: f64,
    /// Mean per utterance column (`utt_<token>`); missing columns mean zero
    pub mean_utterances: BTreeMap<String, f64>,
}

impl StrategySweepRow {
    /// Reduce a per-state table to one row.
    pub fn from_table(
        config: StrategyConfig,
        num_pins: usize,
        num_colors: usize,
        table: &ConditionTable,
    ) -> Self {
        Self {
            speaker: config.speaker,
            listener: config.listener,
            num_pins,
            num_colors,
            states: table.len(),
            mean_rounds: table.mean_rounds(),
            mean_utterances: table.mean_utterances(),
        }
    }

    pub fn config(&self) -> StrategyConfig {
        StrategyConfig::new(self.speaker, self.listener)
    }

    /// Mean for an utterance column, zero if this pair never produced it.
    pub fn mean_utterance(&self, column: &str) -> f64 {
        self.mean_utterances.get(column).copied().unwrap_or(0.0)
    }
}

/// One row per strategy pair, rectangular over every utterance column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepTable {
    pub rows: Vec<StrategySweepRow>,
}

impl SweepTable {
    pub fn new(rows: Vec<StrategySweepRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for a strategy pair.
    pub fn get(&self, config: StrategyConfig) -> Option<&StrategySweepRow> {
        self.rows.iter().find(|row| row.config() == config)
    }

    /// Union of utterance columns across all rows.
    pub fn utterance_columns(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .flat_map(|row| row.mean_utterances.keys().cloned())
            .collect()
    }

    /// Output columns, excluding the leading index column.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec!["mean_rounds".to_string()];
        names.extend(
            self.utterance_columns()
                .iter()
                .map(|column| format!("{}{}", MEAN_PREFIX, column)),
        );
        names.extend(
            ["numPins", "numColors", "speakerStrategy", "listenerStrategy"].map(String::from),
        );
        names
    }

    /// Encode as CSV; columns a row never observed are written as `0.0`.
    pub fn to_csv(&self) -> String {
        let columns: Vec<String> = self.utterance_columns().into_iter().collect();

        let mut header = vec![String::new()];
        header.extend(self.column_names());
        let mut out = write_record(&header);

        for (index, row) in self.rows.iter().enumerate() {
            let mut fields = vec![index.to_string(), format_float(row.mean_rounds)];
            fields.extend(columns.iter().map(|c| format_float(row.mean_utterance(c))));
            fields.extend([
                row.num_pins.to_string(),
                row.num_colors.to_string(),
                row.speaker.to_string(),
                row.listener.to_string(),
            ]);
            out.push_str(&write_record(&fields));
        }
        out
    }

    /// Write the CSV table.
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_csv())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Counters collected while a sweep runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Simulator processes launched
    pub simulator_calls: usize,
    /// Strategy pairs served from the cache
    pub cache_hits: usize,
}

/// Full record of a sweep, saved as JSON next to the CSV table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub prefix: String,
    pub script: PathBuf,
    pub num_pins: usize,
    pub num_colors: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub stats: RunStats,
    pub table: SweepTable,
}

impl SweepReport {
    /// Save the report to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Format a duration in milliseconds for display.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{:.1}m", ms as f64 / 60_000.0)
    }
}
