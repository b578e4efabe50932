use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::config::MatchConfig;
use super::profile::{table_files, SignalProfile};

/// How reference tables are grouped into profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Every table is its own reference.
    PerFile,
    /// All tables of a directory are averaged into one reference.
    PerFolder,
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub profile: SignalProfile,
}

/// Named reference profiles to match a measurement against.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    references: Vec<Reference>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, profile: SignalProfile) {
        self.references.push(Reference {
            name: name.into(),
            profile,
        });
    }

    /// Build references from the tables under each of `dirs`.
    pub fn load(dirs: &[PathBuf], mode: MatchMode) -> Result<Self> {
        let mut set = Self::new();
        for dir in dirs {
            match mode {
                MatchMode::PerFile => {
                    for file in table_files(dir)? {
                        let profile = SignalProfile::from_table_file(&file)?;
                        set.insert(file.display().to_string(), profile);
                    }
                }
                MatchMode::PerFolder => {
                    let profile = SignalProfile::from_table_dir(dir)?;
                    set.insert(dir.display().to_string(), profile);
                }
            }
        }
        Ok(set)
    }

    /// Drop the reference built from `path`, so a measurement is not matched
    /// against itself.
    pub fn exclude(&mut self, path: &Path) {
        let name = path.display().to_string();
        self.references.retain(|reference| reference.name != name);
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// Euclidean distance over the union of identifiers. An identifier missing
/// from one side counts as `missing_level` there.
pub fn euclidean_distance(a: &SignalProfile, b: &SignalProfile, missing_level: f64) -> f64 {
    let identifiers: BTreeSet<&str> = a.identifiers().chain(b.identifiers()).collect();

    identifiers
        .into_iter()
        .map(|id| {
            let left = a.level(id).unwrap_or(missing_level);
            let right = b.level(id).unwrap_or(missing_level);
            (left - right).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredReference {
    pub name: String,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    /// Distance to every reference, nearest first.
    pub distances: Vec<ScoredReference>,
    /// Nearest reference under the configured threshold.
    pub closest: Option<ScoredReference>,
}

pub fn match_profile(
    target: &SignalProfile,
    references: &ReferenceSet,
    config: &MatchConfig,
) -> MatchReport {
    let mut distances: Vec<ScoredReference> = references
        .references()
        .iter()
        .map(|reference| ScoredReference {
            name: reference.name.clone(),
            distance: euclidean_distance(target, &reference.profile, config.missing_level),
        })
        .collect();

    distances.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.name.cmp(&b.name))
    });

    let closest = distances
        .first()
        .filter(|best| best.distance < config.max_distance)
        .cloned();

    MatchReport { distances, closest }
}
