//! Mastermind Sweep: strategy statistics for a speaker/listener simulator.
//!
//! This crate drives an external Mastermind simulator (a WebPPL script by
//! default) over every hidden state and every speaker/listener strategy pair:
//! - one blocking subprocess per hidden state, stdout parsed as a trace
//! - per-state summary tables cached on disk, so reruns launch nothing
//! - a sixteen-row table of mean rounds and mean utterance counts

pub mod experiment;
pub mod results;
pub mod simulator;

pub use experiment::{derive_prefix, SweepRunner};
pub use results::{RunStats, StrategySweepRow, SweepReport, SweepTable};
pub use simulator::{SimulationParams, Simulator};
