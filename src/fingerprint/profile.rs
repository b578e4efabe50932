use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::warn;

use crate::export::{parse_tabular, TabularRow};
use crate::models::{Dataset, Reading};

/// Mean signal level per identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalProfile {
    levels: BTreeMap<String, f64>,
}

/// Running sum and count per identifier.
#[derive(Default)]
struct LevelAverager {
    sums: BTreeMap<String, (f64, u32)>,
}

impl LevelAverager {
    fn add(&mut self, identifier: &str, level: i32) {
        let entry = self.sums.entry(identifier.to_string()).or_insert((0.0, 0));
        entry.0 += f64::from(level);
        entry.1 += 1;
    }

    fn finish(self) -> SignalProfile {
        let levels = self
            .sums
            .into_iter()
            .map(|(id, (sum, count))| (id, sum / f64::from(count)))
            .collect();
        SignalProfile { levels }
    }
}

impl SignalProfile {
    pub fn from_levels<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            levels: levels.into_iter().map(|(id, level)| (id.into(), level)).collect(),
        }
    }

    pub fn from_readings<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Self {
        let mut averager = LevelAverager::default();
        for reading in readings {
            averager.add(&reading.identifier, reading.signal_level);
        }
        averager.finish()
    }

    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self::from_readings(dataset.readings())
    }

    pub fn from_rows(rows: &[TabularRow]) -> Self {
        let mut averager = LevelAverager::default();
        for row in rows {
            averager.add(&row.identifier, row.signal_level);
        }
        averager.finish()
    }

    /// Average one exported table.
    pub fn from_table_file(path: &Path) -> Result<Self> {
        Ok(Self::from_rows(&read_rows(path)?))
    }

    /// Average every `*.csv` table in `dir` as one measurement set.
    pub fn from_table_dir(dir: &Path) -> Result<Self> {
        let mut rows = Vec::new();
        for file in table_files(dir)? {
            rows.extend(read_rows(&file)?);
        }
        Ok(Self::from_rows(&rows))
    }

    pub fn level(&self, identifier: &str) -> Option<f64> {
        self.levels.get(identifier).copied()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

fn read_rows(path: &Path) -> Result<Vec<TabularRow>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read table {}", path.display()))?;
    parse_tabular(&text).with_context(|| format!("Malformed table {}", path.display()))
}

/// `*.csv` files directly inside `dir`, sorted by path.
pub(crate) fn table_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Reference directory {} not found", dir.display());
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join("*.csv");
    let paths = glob::glob(&pattern.to_string_lossy())
        .with_context(|| format!("Invalid table pattern {}", pattern.display()))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) => warn!("Skipping unreadable reference entry: {err}"),
        }
    }
    files.sort();
    Ok(files)
}
