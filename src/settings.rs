use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::scheduler::RunConfig;

/// Sampling parameters persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerSettings {
    pub total_rounds: u32,
    pub interval_secs: u64,
    pub output_dir: PathBuf,
    pub poll_timeout_secs: u64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            total_rounds: run.total_rounds,
            interval_secs: run.interval_secs,
            output_dir: run.output_dir,
            poll_timeout_secs: run.poll_timeout_secs,
        }
    }
}

impl SamplerSettings {
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig {
            total_rounds: self.total_rounds,
            interval_secs: self.interval_secs,
            output_dir: self.output_dir.clone(),
            poll_timeout_secs: self.poll_timeout_secs,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<SamplerSettings>,
}

impl SettingsStore {
    /// Open the store at `path`. A missing file yields defaults; an
    /// unreadable one is an error; a corrupt one is logged and replaced by
    /// defaults on the next write.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring corrupt settings in {}: {err}", path.display());
                SamplerSettings::default()
            })
        } else {
            SamplerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn sampler(&self) -> Result<SamplerSettings> {
        let guard = self
            .data
            .read()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        Ok(guard.clone())
    }

    /// Replace the settings after checking they form a valid run
    /// configuration, then write them to disk.
    pub fn update_sampler(&self, settings: SamplerSettings) -> Result<()> {
        settings
            .to_run_config()
            .validate()
            .context("Refusing to store invalid sampler settings")?;

        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: SamplerSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &SamplerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
