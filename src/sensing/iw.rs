//! Linux sample source backed by `iw`.
//!
//! `scan` reads the kernel's cached results with `iw dev <iface> scan dump`,
//! which returns immediately. `trigger_refresh` runs
//! `iw dev <iface> scan trigger` on a detached thread; the fresh results show
//! up in a later dump, usually by the next round.

use std::process::{Command, Stdio};
use std::thread;

use crate::error::SourceError;
use crate::models::Reading;

use super::SampleSource;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const DEFAULT_SIGNAL_DBM: i32 = -100;

pub struct IwScanSource {
    interface: String,
}

impl IwScanSource {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl Default for IwScanSource {
    fn default() -> Self {
        Self::new("wlan0")
    }
}

impl SampleSource for IwScanSource {
    fn scan(&self) -> Result<Vec<Reading>, SourceError> {
        let args = ["dev", self.interface.as_str(), "scan", "dump"];
        let output = Command::new("iw")
            .args(args)
            .output()
            .map_err(|err| SourceError::Process(format!("`iw {}`: {err}", args.join(" "))))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Unavailable(format!(
                "iw exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let readings = parse_iw_scan(&String::from_utf8_lossy(&output.stdout));
        log_debug!("iw dump on {}: {} BSS entries", self.interface, readings.len());
        Ok(readings)
    }

    fn trigger_refresh(&self) {
        let interface = self.interface.clone();
        let spawned = thread::Builder::new()
            .name("iw-scan-trigger".into())
            .spawn(move || {
                let status = Command::new("iw")
                    .args(["dev", interface.as_str(), "scan", "trigger"])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status();
                match status {
                    Ok(status) if status.success() => log_debug!("scan triggered on {interface}"),
                    Ok(status) => log_debug!("scan trigger on {interface} exited with {status}"),
                    Err(err) => log_warn!("failed to trigger scan on {interface}: {err}"),
                }
            });

        if let Err(err) = spawned {
            log_warn!("failed to spawn scan trigger thread: {err}");
        }
    }
}

#[derive(Default)]
struct BssStanza {
    bssid: String,
    ssid: Option<String>,
    signal_dbm: Option<f64>,
    freq_mhz: Option<u32>,
    flags: Vec<String>,
    rsn: bool,
    wpa: bool,
}

impl BssStanza {
    fn into_reading(self) -> Reading {
        Reading {
            capabilities: self.capabilities(),
            identifier: self.bssid,
            label: self.ssid.unwrap_or_default(),
            frequency: self.freq_mhz.unwrap_or(0),
            signal_level: self
                .signal_dbm
                .map(|dbm| dbm.round() as i32)
                .unwrap_or(DEFAULT_SIGNAL_DBM),
        }
    }

    /// Bracketed tokens in the style of Android scan results,
    /// e.g. `[WPA2][ESS]`.
    fn capabilities(&self) -> String {
        let mut tokens: Vec<&str> = Vec::new();
        if self.rsn {
            tokens.push("WPA2");
        }
        if self.wpa {
            tokens.push("WPA");
        }
        if !self.rsn && !self.wpa && self.flags.iter().any(|f| f == "Privacy") {
            tokens.push("WEP");
        }
        for flag in &self.flags {
            if flag == "ESS" || flag == "IBSS" {
                tokens.push(flag);
            }
        }
        tokens.iter().map(|t| format!("[{t}]")).collect()
    }
}

/// Parse `iw dev <iface> scan [dump]` output into readings, one per BSS.
pub fn parse_iw_scan(output: &str) -> Vec<Reading> {
    let mut readings = Vec::new();
    let mut current: Option<BssStanza> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("BSS ") {
            if let Some(stanza) = current.take() {
                readings.push(stanza.into_reading());
            }

            // "BSS aa:bb:cc:dd:ee:ff(on wlan0) -- associated"
            let mac_end = rest
                .find(|c: char| !c.is_ascii_hexdigit() && c != ':')
                .unwrap_or(rest.len());
            let mac = &rest[..mac_end];
            if mac.len() == 17 {
                current = Some(BssStanza {
                    bssid: mac.to_ascii_lowercase(),
                    ..BssStanza::default()
                });
            }
            continue;
        }

        let Some(stanza) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("SSID:") {
            stanza.ssid = Some(rest.trim().to_owned());
        } else if let Some(rest) = trimmed.strip_prefix("signal:") {
            stanza.signal_dbm = rest.split_whitespace().next().and_then(|n| n.parse().ok());
        } else if let Some(rest) = trimmed.strip_prefix("freq:") {
            // newer iw prints fractional MHz, e.g. "2412.0"
            stanza.freq_mhz = rest
                .trim()
                .parse::<f64>()
                .ok()
                .map(|mhz| mhz.round() as u32);
        } else if let Some(rest) = trimmed.strip_prefix("capability:") {
            stanza.flags = rest
                .split_whitespace()
                .take_while(|word| !word.starts_with('('))
                .map(str::to_owned)
                .collect();
        } else if trimmed.starts_with("RSN:") {
            stanza.rsn = true;
        } else if trimmed.starts_with("WPA:") {
            stanza.wpa = true;
        }
    }

    if let Some(stanza) = current.take() {
        readings.push(stanza.into_reading());
    }

    readings
}
