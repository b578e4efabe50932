use log::warn;

use crate::error::SourceError;
use crate::models::Reading;

/// Producer of one round's readings.
///
/// `poll` never blocks waiting for fresh data: it returns whatever the
/// provider currently holds. `trigger_refresh` asks the provider to start
/// preparing the next batch, which may only be visible one interval later.
pub trait SampleSource: Send + Sync {
    /// Raw access to the provider.
    fn scan(&self) -> Result<Vec<Reading>, SourceError>;

    /// Current readings; an unavailable provider yields an empty round.
    fn poll(&self) -> Vec<Reading> {
        match self.scan() {
            Ok(readings) => readings,
            Err(err) => {
                warn!("sample source failed, recording empty round: {err}");
                Vec::new()
            }
        }
    }

    /// Fire-and-forget request for the next batch.
    fn trigger_refresh(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl SampleSource for Offline {
        fn scan(&self) -> Result<Vec<Reading>, SourceError> {
            Err(SourceError::Unavailable("radio off".into()))
        }
    }

    #[test]
    fn poll_swallows_provider_errors() {
        assert!(Offline.poll().is_empty());
    }
}
