pub mod accumulator;
pub mod iw;
pub mod loop_worker;
pub mod simulated;
pub mod source;

pub use accumulator::RoundAccumulator;
pub use iw::{parse_iw_scan, IwScanSource};
pub use simulated::{SimulatedAccessPoint, SimulatedSource};
pub use source::SampleSource;
