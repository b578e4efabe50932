pub mod dataset;
pub mod reading;

pub use dataset::{Dataset, Round};
pub use reading::Reading;
