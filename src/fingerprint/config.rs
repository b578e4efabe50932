/// Thresholds for matching a measurement against reference profiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    /// Level assumed for an identifier seen in only one of the two profiles (dBm)
    pub missing_level: f64,

    /// References at or beyond this distance are never reported as closest
    pub max_distance: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            missing_level: -99.0,
            max_distance: 100.0,
        }
    }
}
