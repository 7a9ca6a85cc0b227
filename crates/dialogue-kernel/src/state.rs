//! Hidden game states: every assignment of colors to pins.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag prepended to the digit sequence of a state identifier.
pub const STATE_TAG: char = 's';

/// One hidden configuration the listener tries to infer.
///
/// Identified as `s` followed by one digit per pin, e.g. `s0110`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameState {
    colors: Vec<u8>,
}

impl GameState {
    /// Build a state from per-pin colors.
    pub fn new(colors: Vec<u8>) -> Self {
        Self { colors }
    }

    /// Per-pin colors, left to right.
    pub fn colors(&self) -> &[u8] {
        &self.colors
    }

    pub fn num_pins(&self) -> usize {
        self.colors.len()
    }

    /// The identifier passed to the simulator as `trueState`.
    pub fn id(&self) -> String {
        let mut id = String::with_capacity(self.colors.len() + 1);
        id.push(STATE_TAG);
        for &color in &self.colors {
            id.push(char::from(b'0' + color));
        }
        id
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Size of the state space: `num_colors ^ num_pins`, or `None` if it does
/// not fit in a `usize`.
pub fn state_count(num_pins: usize, num_colors: usize) -> Option<usize> {
    let exponent = u32::try_from(num_pins).ok()?;
    num_colors.checked_pow(exponent)
}

/// Enumerate every hidden state in lexicographic order.
///
/// The first pin varies slowest, matching a Cartesian product over pin
/// positions with colors `0..num_colors`. Dimensions are a caller contract;
/// [`crate::SweepConfig::validate`] rejects unusable ones. A state space too
/// large to count yields no states.
pub fn enumerate_states(num_pins: usize, num_colors: usize) -> Vec<GameState> {
    let Some(total) = state_count(num_pins, num_colors) else {
        return Vec::new();
    };
    let mut states = Vec::with_capacity(total);
    let mut colors = vec![0u8; num_pins];

    for _ in 0..total {
        states.push(GameState::new(colors.clone()));

        // Odometer step: bump the last pin, carry leftwards
        for pin in (0..num_pins).rev() {
            colors[pin] += 1;
            if usize::from(colors[pin]) < num_colors {
                break;
            }
            colors[pin] = 0;
        }
    }

    states
}
