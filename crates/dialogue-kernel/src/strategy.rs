//! Agent strategies and speaker/listener pairings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Behavioral policy of one agent.
///
/// Two axes: stochastic vs. greedy action selection, crossed with
/// cooperative vs. uncooperative intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    StochasticCoop,
    StochasticUncoop,
    GreedyCoop,
    GreedyUncoop,
}

impl Strategy {
    /// All strategies in sweep order.
    pub fn all() -> [Self; 4] {
        [
            Self::StochasticCoop,
            Self::StochasticUncoop,
            Self::GreedyCoop,
            Self::GreedyUncoop,
        ]
    }

    /// Name as understood by the simulator.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StochasticCoop => "stochasticCoop",
            Self::StochasticUncoop => "stochasticUncoop",
            Self::GreedyCoop => "greedyCoop",
            Self::GreedyUncoop => "greedyUncoop",
        }
    }

    pub fn is_stochastic(&self) -> bool {
        matches!(self, Self::StochasticCoop | Self::StochasticUncoop)
    }

    pub fn is_cooperative(&self) -> bool {
        matches!(self, Self::StochasticCoop | Self::GreedyCoop)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Unknown strategy: {}. Valid: stochasticCoop, stochasticUncoop, greedyCoop, greedyUncoop",
                    s
                )
            })
    }
}

/// A speaker/listener strategy pairing: one cell of the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(rename = "speakerStrategy")]
    pub speaker: Strategy,
    #[serde(rename = "listenerStrategy")]
    pub listener: Strategy,
}

impl StrategyConfig {
    pub fn new(speaker: Strategy, listener: Strategy) -> Self {
        Self { speaker, listener }
    }

    /// The full 4×4 cross-product, speaker outer and listener inner.
    pub fn all_pairs() -> Vec<Self> {
        Strategy::all()
            .into_iter()
            .flat_map(|speaker| {
                Strategy::all()
                    .into_iter()
                    .map(move |listener| Self::new(speaker, listener))
            })
            .collect()
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speaker={} listener={}", self.speaker, self.listener)
    }
}
