use std::collections::HashMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::EngineError;
use crate::models::{Dataset, Reading, Round};

const ROUND_PREFIX: &str = "measurement ";
const ENTRY_PREFIX: &str = "ap";

struct DatasetView<'a>(&'a Dataset);
struct RoundView<'a>(&'a Round);

impl Serialize for DatasetView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for round in self.0.rounds() {
            map.serialize_entry(&format!("{ROUND_PREFIX}{}", round.index()), &RoundView(round))?;
        }
        map.end()
    }
}

impl Serialize for RoundView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.readings().len()))?;
        for (seq, reading) in self.0.entries() {
            map.serialize_entry(&format!("{ENTRY_PREFIX}{seq}"), reading)?;
        }
        map.end()
    }
}

/// Nested `"measurement N" -> "apK" -> reading` record, in insertion order.
pub fn to_structured(dataset: &Dataset) -> Result<Vec<u8>, EngineError> {
    Ok(serde_json::to_vec(&DatasetView(dataset))?)
}

/// Rebuild a dataset from a structured export.
///
/// Key order in the document does not matter; rounds and entries are
/// ordered by their numeric suffix and must form a contiguous 1..N run.
pub fn from_structured(bytes: &[u8]) -> Result<Dataset, EngineError> {
    let raw: HashMap<String, HashMap<String, Reading>> = serde_json::from_slice(bytes)?;

    let mut rounds = Vec::with_capacity(raw.len());
    for (key, entries) in raw {
        let index: u32 = parse_suffix(&key, ROUND_PREFIX)?;

        let mut numbered = entries
            .into_iter()
            .map(|(entry_key, reading)| Ok((parse_suffix::<usize>(&entry_key, ENTRY_PREFIX)?, reading)))
            .collect::<Result<Vec<_>, EngineError>>()?;
        numbered.sort_by_key(|(seq, _)| *seq);
        for (expected, (seq, _)) in (1..).zip(&numbered) {
            if *seq != expected {
                return Err(EngineError::Serialization(format!(
                    "{key:?}: entry {ENTRY_PREFIX}{seq} found where {ENTRY_PREFIX}{expected} was expected"
                )));
            }
        }

        rounds.push(Round::new(
            index,
            numbered.into_iter().map(|(_, reading)| reading).collect(),
        ));
    }
    rounds.sort_by_key(Round::index);

    Dataset::from_rounds(rounds)
}

/// Numeric suffix of `key` after `prefix`, written exactly as the exporter
/// writes it: ASCII digits, no sign, padding or leading zero.
fn parse_suffix<T: std::str::FromStr>(key: &str, prefix: &str) -> Result<T, EngineError> {
    key.strip_prefix(prefix)
        .filter(|suffix| {
            suffix.bytes().all(|b| b.is_ascii_digit())
                && !suffix.is_empty()
                && !suffix.starts_with('0')
        })
        .and_then(|suffix| suffix.parse().ok())
        .ok_or_else(|| EngineError::Serialization(format!("unexpected key {key:?}")))
}
