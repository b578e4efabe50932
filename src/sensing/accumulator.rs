use log::warn;

use crate::error::EngineError;
use crate::export::encode_line;
use crate::models::{Dataset, Reading, Round};

/// Merges rounds into the run's dataset and keeps the flattened table in
/// step with it, so the table for rounds seen so far is always available.
#[derive(Debug, Default)]
pub struct RoundAccumulator {
    dataset: Dataset,
    table: String,
    unencodable: usize,
}

impl RoundAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a round and return the table lines it contributed.
    ///
    /// A repeated index fails with [`EngineError::DuplicateRound`] and leaves
    /// the dataset untouched. Readings whose fields cannot be encoded stay in
    /// the dataset but contribute no line here.
    pub fn add_round(&mut self, index: u32, readings: Vec<Reading>) -> Result<String, EngineError> {
        self.dataset.push(Round::new(index, readings))?;

        let mut lines = String::new();
        if let Some(round) = self.dataset.rounds().last() {
            for reading in round.readings() {
                match encode_line(reading) {
                    Ok(line) => lines.push_str(&line),
                    Err(err) => {
                        self.unencodable += 1;
                        warn!("round {index}: skipping table line for {}: {err}", reading.identifier);
                    }
                }
            }
        }

        self.table.push_str(&lines);
        Ok(lines)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Table lines accumulated so far.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Readings that were stored without a table line.
    pub fn unencodable(&self) -> usize {
        self.unencodable
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }
}
