use crate::error::EngineError;

use super::Reading;

/// Readings collected during one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    index: u32,
    readings: Vec<Reading>,
}

impl Round {
    pub fn new(index: u32, readings: Vec<Reading>) -> Self {
        Self { index, readings }
    }

    /// Round index, starting at 1.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Readings paired with their per-round sequence id (1-based).
    pub fn entries(&self) -> impl Iterator<Item = (usize, &Reading)> {
        self.readings.iter().enumerate().map(|(pos, r)| (pos + 1, r))
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Ordered rounds of one run.
///
/// Round indices are always contiguous from 1; [`Dataset::push`] is the only
/// way to grow it and rejects duplicates and gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    rounds: Vec<Round>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from rounds that must already be in 1..=N order.
    pub fn from_rounds(rounds: Vec<Round>) -> Result<Self, EngineError> {
        let mut dataset = Self::new();
        for round in rounds {
            dataset.push(round)?;
        }
        Ok(dataset)
    }

    pub fn push(&mut self, round: Round) -> Result<(), EngineError> {
        let expected = self.next_index();
        match round.index {
            index if index >= 1 && index < expected => Err(EngineError::DuplicateRound { index }),
            index if index != expected => Err(EngineError::RoundOutOfOrder {
                expected,
                got: index,
            }),
            _ => {
                self.rounds.push(round);
                Ok(())
            }
        }
    }

    /// Index the next pushed round must carry.
    pub fn next_index(&self) -> u32 {
        self.rounds.len() as u32 + 1
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn round(&self, index: u32) -> Option<&Round> {
        let pos = index.checked_sub(1)? as usize;
        self.rounds.get(pos)
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Total readings across all rounds.
    pub fn reading_count(&self) -> usize {
        self.rounds.iter().map(|round| round.readings.len()).sum()
    }

    pub fn readings(&self) -> impl Iterator<Item = &Reading> {
        self.rounds.iter().flat_map(|round| round.readings.iter())
    }
}
