use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;

use crate::error::EngineError;
use crate::models::Dataset;

use super::{to_structured, to_tabular};

/// Files written for one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifacts {
    pub structured: PathBuf,
    pub tabular: PathBuf,
}

/// File-name stamp for a run, e.g. `20261018_142501`.
pub fn run_stamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

pub fn artifact_paths(dir: &Path, stamp: &str) -> ExportArtifacts {
    ExportArtifacts {
        structured: dir.join(format!("result_{stamp}.json")),
        tabular: dir.join(format!("result_{stamp}.csv")),
    }
}

/// Incremental table written while a run is in progress.
pub fn journal_path(dir: &Path, stamp: &str) -> PathBuf {
    dir.join(format!("result_{stamp}.csv.partial"))
}

/// Encode both representations, then write them, replacing existing files.
pub async fn write_artifacts(
    dataset: &Dataset,
    dir: &Path,
    stamp: &str,
) -> Result<ExportArtifacts, EngineError> {
    let structured = to_structured(dataset)?;
    let tabular = to_tabular(dataset)?;

    let paths = artifact_paths(dir, stamp);
    tokio::fs::write(&paths.structured, structured).await?;
    tokio::fs::write(&paths.tabular, tabular).await?;

    info!(
        "exported {} rounds ({} readings) to {} and {}",
        dataset.len(),
        dataset.reading_count(),
        paths.structured.display(),
        paths.tabular.display()
    );
    Ok(paths)
}
