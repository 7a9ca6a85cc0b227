//! Integration tests for the full sweep against a fake simulator.
//!
//! The fake is a POSIX shell script run through `sh`. It plays one round per
//! `1` pin in the true state plus a final round, says `none` on the last
//! round and `some`/`many` before it depending on the speaker strategy, and
//! appends a line to a counter file on every launch so tests can count
//! subprocesses.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dialogue_kernel::{CacheKey, CsvStore, Strategy, StrategyConfig, SummaryStore, SweepConfig};
use mastermind_sweep::{Simulator, SweepRunner, SweepTable};

const FAKE_SIMULATOR: &str = r#"
echo run >> "__COUNTER__"
state=""
speaker=""
while [ $# -gt 0 ]; do
  case "$1" in
    --trueState) state="$2"; shift 2 ;;
    --speakerStrategy) speaker="$2"; shift 2 ;;
    *) shift ;;
  esac
done
ones=$(printf '%s' "$state" | tr -cd '1' | wc -c)
rounds=$((ones + 1))
i=1
while [ "$i" -le "$rounds" ]; do
  echo "Listener belief count is $((rounds - i + 1))"
  echo "Listener predicts $state"
  if [ "$i" -eq "$rounds" ]; then
    echo "Speaker says none"
  else
    case "$speaker" in
      greedy*) echo "Speaker says many" ;;
      *) echo "Speaker says some" ;;
    esac
  fi
  i=$((i + 1))
done
"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    script: PathBuf,
    counter: PathBuf,
}

impl Fixture {
    fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let counter = root.join("launches.txt");
        let script = root.join("pragmatic_mastermind.sh");
        std::fs::write(
            &script,
            body.replace("__COUNTER__", &counter.display().to_string()),
        )
        .unwrap();

        Self {
            _dir: dir,
            root,
            script,
            counter,
        }
    }

    fn launches(&self) -> usize {
        std::fs::read_to_string(&self.counter)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    fn cache_dir(&self) -> PathBuf {
        self.root.join("statistics")
    }

    fn runner(&self, cache_dir: &Path, jobs: usize) -> SweepRunner {
        let config = SweepConfig {
            num_pins: 2,
            num_colors: 2,
            jobs,
            ..Default::default()
        };
        SweepRunner::new(
            Simulator::new("sh", &self.script),
            Arc::new(CsvStore::new(cache_dir)),
            "pragmatic",
            &config,
        )
    }
}

fn pair(speaker: Strategy, listener: Strategy) -> StrategyConfig {
    StrategyConfig::new(speaker, listener)
}

#[tokio::test]
async fn test_two_by_two_sweep() {
    let fixture = Fixture::new(FAKE_SIMULATOR);
    let runner = fixture.runner(&fixture.cache_dir(), 1);

    let table = runner.run_sweep().await.unwrap();

    // 16 pairs x 4 hidden states
    assert_eq!(table.len(), 16);
    assert_eq!(fixture.launches(), 64);
    assert_eq!(runner.stats().simulator_calls, 64);
    assert_eq!(runner.stats().cache_hits, 0);

    for row in &table.rows {
        assert_eq!(row.states, 4);
        // s00: 1 round, s01/s10: 2 rounds, s11: 3 rounds
        assert_eq!(row.mean_rounds, 2.0);
        assert_eq!(row.mean_utterance("utt_none"), 1.0);
        for column in table.utterance_columns() {
            let mean = row.mean_utterance(&column);
            assert!((0.0..=4.0).contains(&mean), "{} = {}", column, mean);
        }
    }

    let stochastic = table
        .get(pair(Strategy::StochasticCoop, Strategy::GreedyUncoop))
        .unwrap();
    assert_eq!(stochastic.mean_utterance("utt_some"), 1.0);
    assert_eq!(stochastic.mean_utterance("utt_many"), 0.0);

    let greedy = table
        .get(pair(Strategy::GreedyUncoop, Strategy::StochasticCoop))
        .unwrap();
    assert_eq!(greedy.mean_utterance("utt_many"), 1.0);
    assert_eq!(greedy.mean_utterance("utt_some"), 0.0);
}

#[tokio::test]
async fn test_sweep_csv_is_rectangular_and_zero_filled() {
    let fixture = Fixture::new(FAKE_SIMULATOR);
    let table = fixture
        .runner(&fixture.cache_dir(), 1)
        .run_sweep()
        .await
        .unwrap();

    let path = fixture.root.join("pragmatic_strategy_stats.csv");
    table.save_csv(&path).unwrap();
    let csv = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 17);
    assert_eq!(
        lines[0],
        ",mean_rounds,mean_utt_many,mean_utt_none,mean_utt_some,numPins,numColors,speakerStrategy,listenerStrategy"
    );
    assert_eq!(
        lines[1],
        "0,2.0,0.0,1.0,1.0,2,2,stochasticCoop,stochasticCoop"
    );
    assert_eq!(lines[16], "15,2.0,1.0,1.0,0.0,2,2,greedyUncoop,greedyUncoop");
    assert!(lines.iter().all(|line| line.split(',').count() == 9));
}

#[tokio::test]
async fn test_second_sweep_is_served_from_cache() {
    let fixture = Fixture::new(FAKE_SIMULATOR);

    let first = fixture
        .runner(&fixture.cache_dir(), 1)
        .run_sweep()
        .await
        .unwrap();
    assert_eq!(fixture.launches(), 64);

    let runner = fixture.runner(&fixture.cache_dir(), 1);
    let second: SweepTable = runner.run_sweep().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fixture.launches(), 64, "cached sweep launched the simulator");
    assert_eq!(runner.stats().simulator_calls, 0);
    assert_eq!(runner.stats().cache_hits, 16);
}

#[tokio::test]
async fn test_cache_artifacts_are_lowercase_per_pair() {
    let fixture = Fixture::new(FAKE_SIMULATOR);
    let runner = fixture.runner(&fixture.cache_dir(), 1);

    runner
        .run_pair(pair(Strategy::GreedyCoop, Strategy::StochasticUncoop))
        .await
        .unwrap();

    let path = fixture
        .cache_dir()
        .join("pragmatic_2_2_greedycoop_stochasticuncoop.csv");
    let csv = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        ",n_rounds,utt_many,utt_none,numPins,numColors,speakerStrategy,listenerStrategy,trueState"
    );
    assert_eq!(lines[1], "0,1,0,1,2,2,greedyCoop,stochasticUncoop,s00");
    assert_eq!(lines[4], "3,3,2,1,2,2,greedyCoop,stochasticUncoop,s11");
}

#[tokio::test]
async fn test_corrupt_cache_aborts_without_simulating() {
    let fixture = Fixture::new(FAKE_SIMULATOR);
    let runner = fixture.runner(&fixture.cache_dir(), 1);
    let config = pair(Strategy::StochasticCoop, Strategy::StochasticCoop);

    std::fs::create_dir_all(fixture.cache_dir()).unwrap();
    let store = CsvStore::new(fixture.cache_dir());
    std::fs::write(
        store.path(&runner.key(config)),
        ",n_rounds\n0,not-a-number\n",
    )
    .unwrap();
    assert!(store.exists(&runner.key(config)));

    let err = runner.run_sweep().await.unwrap_err();

    assert!(format!("{:#}", err).contains("unreadable"), "{:#}", err);
    assert_eq!(fixture.launches(), 0);
}

#[tokio::test]
async fn test_failing_simulator_aborts_sweep() {
    let fixture = Fixture::new(
        "echo run >> \"__COUNTER__\"\necho 'webppl: syntax error' >&2\nexit 1\n",
    );
    let runner = fixture.runner(&fixture.cache_dir(), 1);

    let err = runner.run_sweep().await.unwrap_err();
    let message = format!("{:#}", err);

    assert!(message.contains("exited"), "{}", message);
    assert!(message.contains("syntax error"), "{}", message);
    // Fails fast on the first state and caches nothing
    assert_eq!(fixture.launches(), 1);
    assert!(!fixture.cache_dir().exists());
}

#[tokio::test]
async fn test_malformed_trace_aborts_sweep() {
    let fixture = Fixture::new(
        "echo run >> \"__COUNTER__\"\necho 'Listener belief count is lots'\necho 'Listener predicts s00'\necho 'Speaker says none'\n",
    );
    let runner = fixture.runner(&fixture.cache_dir(), 1);

    let err = runner.run_sweep().await.unwrap_err();
    let message = format!("{:#}", err);

    assert!(message.contains("round 1, line 1"), "{}", message);
    assert_eq!(fixture.launches(), 1);
}

#[tokio::test]
async fn test_worker_pool_matches_sequential() {
    let fixture = Fixture::new(FAKE_SIMULATOR);

    let sequential = fixture
        .runner(&fixture.root.join("seq"), 1)
        .run_sweep()
        .await
        .unwrap();
    let pooled = fixture
        .runner(&fixture.root.join("pool"), 4)
        .run_sweep()
        .await
        .unwrap();

    assert_eq!(sequential, pooled);
    assert_eq!(fixture.launches(), 128);

    for config in StrategyConfig::all_pairs() {
        let file = CacheKey::new("pragmatic", 2, 2, config).file_name();
        assert_eq!(
            std::fs::read_to_string(fixture.root.join("seq").join(&file)).unwrap(),
            std::fs::read_to_string(fixture.root.join("pool").join(&file)).unwrap(),
            "{}",
            config
        );
    }
}
