use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::error::SourceError;
use crate::models::Reading;

use super::SampleSource;

/// An access point the simulator reports, with its nominal signal level.
#[derive(Debug, Clone)]
pub struct SimulatedAccessPoint {
    pub reading: Reading,
    /// Probability in `[0, 1]` that the AP is missing from a poll.
    pub dropout: f64,
}

impl SimulatedAccessPoint {
    pub fn new(reading: Reading) -> Self {
        Self {
            reading,
            dropout: 0.0,
        }
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout.clamp(0.0, 1.0);
        self
    }
}

/// Sample source reporting a fixed set of access points with jittered
/// signal levels. Used for dry runs without a wireless interface.
pub struct SimulatedSource {
    access_points: Vec<SimulatedAccessPoint>,
    jitter_db: i32,
    refreshes: AtomicU64,
}

impl SimulatedSource {
    pub fn new(access_points: Vec<SimulatedAccessPoint>, jitter_db: i32) -> Self {
        Self {
            access_points,
            jitter_db: jitter_db.abs(),
            refreshes: AtomicU64::new(0),
        }
    }

    /// A small office-like environment.
    pub fn demo() -> Self {
        Self::new(
            vec![
                SimulatedAccessPoint::new(Reading::new("02:1a:11:f0:00:01", "Office", 2412, -48, "[WPA2-PSK-CCMP][ESS]")),
                SimulatedAccessPoint::new(Reading::new("02:1a:11:f0:00:02", "Office-5G", 5180, -61, "[WPA2-PSK-CCMP][ESS]")),
                SimulatedAccessPoint::new(Reading::new("02:1a:11:f0:00:03", "Guest", 2437, -72, "[ESS]"))
                    .with_dropout(0.2),
                SimulatedAccessPoint::new(Reading::new("02:1a:11:f0:00:04", "Printer", 2462, -85, "[WPA2-PSK-CCMP][ESS]"))
                    .with_dropout(0.5),
            ],
            4,
        )
    }

    /// Number of refresh requests received so far.
    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

impl SampleSource for SimulatedSource {
    fn scan(&self) -> Result<Vec<Reading>, SourceError> {
        let mut rng = rand::thread_rng();
        let mut readings = Vec::with_capacity(self.access_points.len());
        for ap in &self.access_points {
            if ap.dropout > 0.0 && rng.gen_bool(ap.dropout.min(1.0)) {
                continue;
            }
            let mut reading = ap.reading.clone();
            if self.jitter_db > 0 {
                reading.signal_level += rng.gen_range(-self.jitter_db..=self.jitter_db);
            }
            readings.push(reading);
        }
        Ok(readings)
    }

    fn trigger_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }
}
