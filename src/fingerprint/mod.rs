//! Location matching over averaged signal levels.
//!
//! A measurement is reduced to a [`SignalProfile`] (mean level per
//! identifier) and compared to named reference profiles by Euclidean
//! distance.

pub mod config;
pub mod matching;
pub mod profile;

pub use config::MatchConfig;
pub use matching::{
    euclidean_distance, match_profile, MatchMode, MatchReport, Reference, ReferenceSet,
    ScoredReference,
};
pub use profile::SignalProfile;
