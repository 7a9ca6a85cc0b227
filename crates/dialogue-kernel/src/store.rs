//! Cache keys and stores for per-state summary tables.
//!
//! Key construction lives in [`CacheKey`] alone; a store only sees the key's
//! file name, so backends can be swapped without touching the aggregation
//! code.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::TableError;
use crate::strategy::StrategyConfig;
use crate::table::ConditionTable;

/// Identity of one cached table: (prefix, pins, colors, speaker, listener).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub prefix: String,
    pub num_pins: usize,
    pub num_colors: usize,
    pub config: StrategyConfig,
}

impl CacheKey {
    pub fn new(
        prefix: impl Into<String>,
        num_pins: usize,
        num_colors: usize,
        config: StrategyConfig,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            num_pins,
            num_colors,
            config,
        }
    }

    /// Lower-cased artifact name, e.g. `pragmatic_4_2_greedycoop_stochasticuncoop.csv`.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}.csv",
            self.prefix, self.num_pins, self.num_colors, self.config.speaker, self.config.listener
        )
        .to_lowercase()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Durable storage for per-state summary tables.
pub trait SummaryStore: Send + Sync {
    /// Whether a table is stored under this key.
    fn exists(&self, key: &CacheKey) -> bool;

    /// Load a stored table. Corrupt content is an error, never a miss.
    fn read(&self, key: &CacheKey) -> Result<ConditionTable, TableError>;

    /// Persist a table, replacing any previous one.
    fn write(&self, key: &CacheKey, table: &ConditionTable) -> Result<(), TableError>;
}

/// One CSV file per key inside a directory.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the artifact for `key` lives.
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl SummaryStore for CsvStore {
    fn exists(&self, key: &CacheKey) -> bool {
        self.path(key).is_file()
    }

    fn read(&self, key: &CacheKey) -> Result<ConditionTable, TableError> {
        let path = self.path(key);
        let text = std::fs::read_to_string(&path).map_err(|source| TableError::Io {
            path: path.clone(),
            source,
        })?;
        ConditionTable::from_csv(&text, &path.display().to_string())
    }

    fn write(&self, key: &CacheKey, table: &ConditionTable) -> Result<(), TableError> {
        std::fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        // Write beside the target and rename, so readers never see a partial file
        let path = self.path(key);
        let tmp = path.with_extension("csv.tmp");
        std::fs::write(&tmp, table.to_csv(key)).map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> TableError {
    let path = path.to_path_buf();
    move |source| TableError::Io { path, source }
}

/// In-process store, keyed by file name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, ConditionTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, ConditionTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SummaryStore for MemoryStore {
    fn exists(&self, key: &CacheKey) -> bool {
        self.tables().contains_key(&key.file_name())
    }

    fn read(&self, key: &CacheKey) -> Result<ConditionTable, TableError> {
        self.tables()
            .get(&key.file_name())
            .cloned()
            .ok_or_else(|| TableError::NotFound(key.file_name()))
    }

    fn write(&self, key: &CacheKey, table: &ConditionTable) -> Result<(), TableError> {
        self.tables().insert(key.file_name(), table.clone());
        Ok(())
    }
}
