//! Experiment runner for strategy sweeps.
//!
//! Orchestrates the sweep lifecycle:
//! 1. For each speaker/listener pair, look for a cached per-state table
//! 2. On a miss, run the simulator once per hidden state and condense each trace
//! 3. Persist the table, then average it into one sweep row
//! 4. Collect the sixteen rows into the sweep table

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use dialogue_kernel::{
    condense, enumerate_states, CacheKey, ConditionRow, ConditionTable, StrategyConfig,
    SummaryStore, SweepConfig,
};

use crate::results::{RunStats, StrategySweepRow, SweepTable};
use crate::simulator::{SimulationParams, Simulator};

/// Label for a simulator script: its file name up to the first `_`.
///
/// `models/pragmatic_mastermind.wppl` becomes `pragmatic`. A name without
/// `_` is used whole, extension included.
pub fn derive_prefix(script: &Path) -> String {
    let name = script
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match name.split_once('_') {
        Some((head, _)) => head.to_string(),
        None => name,
    }
}

/// Runs strategy pairs against the simulator, backed by a table cache.
pub struct SweepRunner {
    simulator: Simulator,
    store: Arc<dyn SummaryStore>,
    prefix: String,
    num_pins: usize,
    num_colors: usize,
    jobs: usize,
    simulator_calls: AtomicUsize,
    cache_hits: AtomicUsize,
}

impl SweepRunner {
    /// Create a runner for the dimensions and worker count in `config`.
    pub fn new(
        simulator: Simulator,
        store: Arc<dyn SummaryStore>,
        prefix: impl Into<String>,
        config: &SweepConfig,
    ) -> Self {
        Self {
            simulator,
            store,
            prefix: prefix.into(),
            num_pins: config.num_pins,
            num_colors: config.num_colors,
            jobs: config.jobs.max(1),
            simulator_calls: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Cache key for a strategy pair under this runner's dimensions.
    pub fn key(&self, config: StrategyConfig) -> CacheKey {
        CacheKey::new(&self.prefix, self.num_pins, self.num_colors, config)
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> RunStats {
        RunStats {
            simulator_calls: self.simulator_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Per-state table for a pair: from the cache if present, otherwise
    /// simulated and then cached.
    ///
    /// A cached table that cannot be read is an error; it is never silently
    /// recomputed.
    pub async fn condition_table(&self, config: StrategyConfig) -> Result<ConditionTable> {
        let key = self.key(config);

        if self.store.exists(&key) {
            let table = self
                .store
                .read(&key)
                .with_context(|| format!("Cached table {} is unreadable", key))?;
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            info!(key = %key, states = table.len(), "Loaded cached condition table");
            return Ok(table);
        }

        let table = self.simulate_states(config).await?;
        self.store
            .write(&key, &table)
            .with_context(|| format!("Failed to cache table {}", key))?;
        info!(key = %key, states = table.len(), "Cached condition table");
        Ok(table)
    }

    /// Run one strategy pair and average it over all hidden states.
    pub async fn run_pair(&self, config: StrategyConfig) -> Result<StrategySweepRow> {
        let table = self.condition_table(config).await?;
        Ok(StrategySweepRow::from_table(
            config,
            self.num_pins,
            self.num_colors,
            &table,
        ))
    }

    /// Run every speaker/listener pair. Any failure aborts the sweep.
    pub async fn run_sweep(&self) -> Result<SweepTable> {
        let pairs = StrategyConfig::all_pairs();
        let total = pairs.len();
        let mut rows = Vec::with_capacity(total);

        for (i, config) in pairs.into_iter().enumerate() {
            let row = self.run_pair(config).await?;

            info!(
                progress = format!("{}/{}", i + 1, total),
                speaker = %config.speaker,
                listener = %config.listener,
                mean_rounds = row.mean_rounds,
                "Completed strategy pair"
            );
            rows.push(row);
        }

        Ok(SweepTable::new(rows))
    }

    /// Simulate every hidden state for one pair, in enumeration order.
    ///
    /// Up to `jobs` simulator processes run at once; `buffered` yields results
    /// in submission order, so the table is the same for any `jobs`.
    async fn simulate_states(&self, config: StrategyConfig) -> Result<ConditionTable> {
        let states = enumerate_states(self.num_pins, self.num_colors);
        if states.is_empty() {
            bail!(
                "No hidden states to simulate for {} pins and {} colors",
                self.num_pins,
                self.num_colors
            );
        }
        let total = states.len();
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        info!(
            states = total,
            speaker = %config.speaker,
            listener = %config.listener,
            jobs = self.jobs,
            "Running all states"
        );

        let rows: Vec<ConditionRow> = stream::iter(states.iter())
            .map(|state| {
                let params =
                    SimulationParams::for_state(self.num_pins, self.num_colors, config, state);
                async move {
                    self.simulator_calls.fetch_add(1, Ordering::Relaxed);
                    let rounds = self
                        .simulator
                        .simulate(&params)
                        .await
                        .with_context(|| format!("Simulation failed for {} ({})", state, config))?;

                    let summary = condense(&rounds);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(
                        progress = format!("{}/{}", done, total),
                        state = %state,
                        n_rounds = summary.n_rounds,
                        "Completed state"
                    );

                    Ok::<_, anyhow::Error>(ConditionRow {
                        true_state: state.id(),
                        summary,
                    })
                }
            })
            .buffered(self.jobs)
            .try_collect()
            .await?;

        Ok(ConditionTable::new(rows))
    }
}
