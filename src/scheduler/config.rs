use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Parameters of one sampling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Number of rounds to collect (at least 1).
    pub total_rounds: u32,
    /// Seconds between rounds (at least 1).
    pub interval_secs: u64,
    /// Directory that receives the exports; must exist and be writable.
    pub output_dir: PathBuf,
    /// Upper bound on a single poll of the source.
    pub poll_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            total_rounds: 15,
            interval_secs: 5,
            output_dir: PathBuf::from("."),
            poll_timeout_secs: 10,
        }
    }
}

impl RunConfig {
    pub fn new(total_rounds: u32, interval_secs: u64, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            total_rounds,
            interval_secs,
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.total_rounds < 1 {
            return Err(EngineError::InvalidConfig(
                "total_rounds must be at least 1".into(),
            ));
        }
        if self.interval_secs < 1 {
            return Err(EngineError::InvalidConfig(
                "interval_secs must be at least 1".into(),
            ));
        }
        if self.poll_timeout_secs < 1 {
            return Err(EngineError::InvalidConfig(
                "poll_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rounds_or_interval_is_invalid() {
        assert!(RunConfig::new(0, 5, ".").validate().is_err());
        assert!(RunConfig::new(3, 0, ".").validate().is_err());
        assert!(RunConfig::new(1, 1, ".").validate().is_ok());
    }
}
