//! Subprocess wrapper for the external speaker/listener simulator.
//!
//! The simulator is a script run by an interpreter (WebPPL by default):
//!
//! ```text
//! webppl <script> -- --numPins 4 --numColors 2 --speakerStrategy ... --trueState s0101
//! ```
//!
//! Each call blocks until the process exits and hands its stdout, unmodified,
//! to the trace parser.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

use dialogue_kernel::{parse_trace, GameState, RoundRecord, StrategyConfig};

/// Stderr lines kept when reporting a failed run.
const STDERR_TAIL_LINES: usize = 20;

/// Ordered `--key value` parameters for one simulator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationParams {
    entries: Vec<(String, String)>,
}

impl SimulationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries.push((key.into(), value.to_string()));
        self
    }

    /// Parameters for one hidden state under one strategy pair.
    pub fn for_state(
        num_pins: usize,
        num_colors: usize,
        config: StrategyConfig,
        state: &GameState,
    ) -> Self {
        Self::new()
            .with("numPins", num_pins)
            .with("numColors", num_colors)
            .with("speakerStrategy", config.speaker)
            .with("listenerStrategy", config.listener)
            .with("trueState", state)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Flatten into argv tokens. Values are split on whitespace.
    pub fn to_args(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(key, value)| {
                std::iter::once(format!("--{}", key))
                    .chain(value.split_whitespace().map(String::from))
            })
            .collect()
    }
}

impl fmt::Display for SimulationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}

/// A runnable simulator: interpreter command plus script.
#[derive(Debug, Clone)]
pub struct Simulator {
    /// Interpreter program, optionally followed by its own arguments
    runner: String,
    script: PathBuf,
    timeout: Option<Duration>,
}

impl Simulator {
    /// Create a simulator invoked as `<runner> <script> -- <params>`.
    ///
    /// `runner` is split on whitespace, so `"node --stack-size=4096 webppl"`
    /// works as well as a bare program name.
    pub fn new(runner: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            runner: runner.into(),
            script: script.into(),
            timeout: None,
        }
    }

    /// Kill runs that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn runner(&self) -> &str {
        &self.runner
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Arguments following the program name.
    pub fn args(&self, params: &SimulationParams) -> Vec<String> {
        let mut args: Vec<String> = self
            .runner
            .split_whitespace()
            .skip(1)
            .map(String::from)
            .collect();
        args.push(self.script.to_string_lossy().into_owned());
        args.push("--".to_string());
        args.extend(params.to_args());
        args
    }

    /// Launch one run and capture its stdout.
    ///
    /// Spawn failures, non-zero exits, timeouts and non-UTF-8 output are all
    /// errors; there is no fallback to empty output.
    pub async fn run(&self, params: &SimulationParams) -> Result<String> {
        let program = self
            .runner
            .split_whitespace()
            .next()
            .context("Simulator runner is empty")?;

        let mut cmd = Command::new(program);
        cmd.args(self.args(params))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            runner = %self.runner,
            script = %self.script.display(),
            params = %params,
            "Launching simulator"
        );

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .with_context(|| format!("Simulator timed out after {:?} ({})", limit, params))?,
            None => cmd.output().await,
        }
        .with_context(|| {
            format!(
                "Failed to launch simulator `{}` with script {}",
                self.runner,
                self.script.display()
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Simulator exited with {} ({}): {}",
                output.status,
                params,
                stderr_tail(&stderr)
            );
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("Simulator output is not valid UTF-8 ({})", params))
    }

    /// Launch one run and parse its trace into rounds.
    pub async fn simulate(&self, params: &SimulationParams) -> Result<Vec<RoundRecord>> {
        let log = self.run(params).await?;
        parse_trace(&log).with_context(|| format!("Malformed simulator trace ({})", params))
    }
}

/// Last few lines of a process's stderr, for error messages.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialogue_kernel::Strategy;

    fn params() -> SimulationParams {
        SimulationParams::for_state(
            2,
            2,
            StrategyConfig::new(Strategy::GreedyCoop, Strategy::StochasticUncoop),
            &GameState::new(vec![0, 1]),
        )
    }

    #[test]
    fn test_params_order_and_flattening() {
        let params = params();
        assert_eq!(
            params.to_args(),
            vec![
                "--numPins",
                "2",
                "--numColors",
                "2",
                "--speakerStrategy",
                "greedyCoop",
                "--listenerStrategy",
                "stochasticUncoop",
                "--trueState",
                "s01",
            ]
        );
        assert_eq!(params.get("trueState"), Some("s01"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_values_split_on_whitespace() {
        let params = SimulationParams::new().with("label", "two words");
        assert_eq!(params.to_args(), vec!["--label", "two", "words"]);
    }

    #[test]
    fn test_command_line() {
        let simulator = Simulator::new("webppl", "models/pragmatic_mastermind.wppl");
        let args = simulator.args(&SimulationParams::new().with("numPins", 4));
        assert_eq!(
            args,
            vec!["models/pragmatic_mastermind.wppl", "--", "--numPins", "4"]
        );

        let simulator = Simulator::new("node --stack-size=4096 webppl", "m.wppl");
        let args = simulator.args(&SimulationParams::new());
        assert_eq!(args, vec!["--stack-size=4096", "webppl", "m.wppl", "--"]);
    }

    #[test]
    fn test_stderr_tail() {
        let stderr: String = (1..=30).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 11"));
        assert!(tail.ends_with("line 30"));
    }

    #[tokio::test]
    async fn test_missing_runner_is_error() {
        let simulator = Simulator::new("no-such-simulator-runner-xyz", "model.wppl");
        let err = simulator.run(&params()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to launch simulator"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("sim.sh");
            std::fs::write(&path, body).unwrap();
            path
        }

        #[tokio::test]
        async fn test_captures_stdout() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(
                dir.path(),
                "echo \"Listener belief count is 1\"\necho \"Listener predicts $7\"\necho \"Speaker says none\"\n",
            );

            let rounds = Simulator::new("sh", path).simulate(&params()).await.unwrap();
            assert_eq!(rounds.len(), 1);
            assert_eq!(rounds[0].n_beliefs, 1);
            // $1 is the "--" separator, $7 the speaker strategy value
            assert_eq!(rounds[0].prediction, "greedyCoop");
            assert_eq!(rounds[0].utterance, "none");
        }

        #[tokio::test]
        async fn test_nonzero_exit_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(dir.path(), "echo 'model exploded' >&2\nexit 3\n");

            let err = Simulator::new("sh", path).run(&params()).await.unwrap_err();
            let message = format!("{:#}", err);
            assert!(message.contains("exited"), "{}", message);
            assert!(message.contains("model exploded"), "{}", message);
        }

        #[tokio::test]
        async fn test_timeout_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(dir.path(), "sleep 5\n");

            let err = Simulator::new("sh", path)
                .with_timeout(Some(Duration::from_millis(100)))
                .run(&params())
                .await
                .unwrap_err();
            assert!(format!("{:#}", err).contains("timed out"));
        }

        #[tokio::test]
        async fn test_malformed_trace_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(dir.path(), "echo a\necho b\necho c\n");

            let err = Simulator::new("sh", path).simulate(&params()).await.unwrap_err();
            assert!(format!("{:#}", err).contains("Malformed simulator trace"));
        }
    }
}
