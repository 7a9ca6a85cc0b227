//! Configuration types for a strategy sweep.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::state::state_count;

/// State identifiers spend one decimal digit per pin.
pub const MAX_COLORS: usize = 10;

/// Largest state space a sweep will enumerate (one simulator run each).
pub const MAX_STATES: usize = 1 << 20;

/// Top-level sweep configuration.
///
/// Every field has a default, so a JSON file only needs the keys it
/// overrides. Command-line flags are applied on top of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Pins per hidden state
    pub num_pins: usize,

    /// Colors per pin
    pub num_colors: usize,

    /// Program that runs the simulator script (e.g. `webppl`)
    pub runner: String,

    /// Directory holding cached per-state tables
    pub cache_dir: PathBuf,

    /// Directory for the final statistics table and report
    pub output_dir: PathBuf,

    /// Simulator processes allowed to run at once within a strategy pair
    pub jobs: usize,

    /// Kill a simulator run after this many seconds (None waits forever)
    pub timeout_secs: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            num_pins: 4,
            num_colors: 2,
            runner: "webppl".to_string(),
            cache_dir: PathBuf::from("statistics"),
            output_dir: PathBuf::from("."),
            jobs: 1,
            timeout_secs: None,
        }
    }
}

impl SweepConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject dimensions and limits the sweep cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_pins == 0 {
            return Err(ConfigError::InvalidPins(self.num_pins));
        }
        if !(2..=MAX_COLORS).contains(&self.num_colors) {
            return Err(ConfigError::InvalidColors {
                got: self.num_colors,
                max: MAX_COLORS,
            });
        }
        match state_count(self.num_pins, self.num_colors) {
            Some(count) if count <= MAX_STATES => {}
            _ => {
                return Err(ConfigError::TooManyStates {
                    num_pins: self.num_pins,
                    num_colors: self.num_colors,
                    max: MAX_STATES,
                })
            }
        }
        if self.jobs == 0 {
            return Err(ConfigError::InvalidJobs);
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.runner.trim().is_empty() {
            return Err(ConfigError::EmptyRunner);
        }
        Ok(())
    }

    /// Replace every field that `overrides` sets; unset fields keep their
    /// current value.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            num_pins,
            num_colors,
            runner,
            cache_dir,
            output_dir,
            jobs,
            timeout_secs,
        } = overrides;

        if let Some(num_pins) = num_pins {
            self.num_pins = num_pins;
        }
        if let Some(num_colors) = num_colors {
            self.num_colors = num_colors;
        }
        if let Some(runner) = runner {
            self.runner = runner;
        }
        if let Some(cache_dir) = cache_dir {
            self.cache_dir = cache_dir;
        }
        if let Some(output_dir) = output_dir {
            self.output_dir = output_dir;
        }
        if let Some(jobs) = jobs {
            self.jobs = jobs;
        }
        if timeout_secs.is_some() {
            self.timeout_secs = timeout_secs;
        }
    }

    /// Load `file` (or the defaults), apply `overrides` on top and validate
    /// the result.
    pub fn resolve(file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }
}

/// Settings given on the command line, each optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub num_pins: Option<usize>,
    pub num_colors: Option<usize>,
    pub runner: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
}
