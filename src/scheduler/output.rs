use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use uuid::Uuid;

use crate::error::EngineError;

/// Output directories with a run in progress, across all schedulers in the
/// process.
fn active_outputs() -> &'static Mutex<HashSet<PathBuf>> {
    static ACTIVE: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    ACTIVE.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive claim on an output directory, released on drop.
#[derive(Debug)]
pub struct OutputClaim {
    dir: PathBuf,
}

impl OutputClaim {
    pub fn acquire(dir: &Path) -> Result<Self, EngineError> {
        let mut active = active_outputs()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(dir.to_path_buf()) {
            return Err(EngineError::AlreadyRunning(dir.to_path_buf()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

impl Drop for OutputClaim {
    fn drop(&mut self) {
        let mut active = active_outputs()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.dir);
    }
}

/// Check that `dir` exists and accepts new files; returns its canonical path.
pub async fn ensure_output_writable(dir: &Path) -> Result<PathBuf, EngineError> {
    let unavailable = |reason: String| EngineError::OutputUnavailable {
        path: dir.to_path_buf(),
        reason,
    };

    let metadata = tokio::fs::metadata(dir)
        .await
        .map_err(|err| unavailable(err.to_string()))?;
    if !metadata.is_dir() {
        return Err(unavailable("not a directory".into()));
    }

    let probe = dir.join(format!(".roundscan-probe-{}", Uuid::new_v4()));
    tokio::fs::write(&probe, b"")
        .await
        .map_err(|err| unavailable(format!("not writable: {err}")))?;
    let _ = tokio::fs::remove_file(&probe).await;

    tokio::fs::canonicalize(dir)
        .await
        .map_err(|err| unavailable(err.to_string()))
}
