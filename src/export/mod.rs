//! Exporters for a completed dataset.
//!
//! Both encoders are pure functions over `&Dataset`; [`write_artifacts`]
//! encodes both up front so a serialization failure leaves no files behind
//! and the dataset can be exported again.

pub mod structured;
pub mod tabular;
pub mod writer;

pub use structured::{from_structured, to_structured};
pub use tabular::{encode_line, parse_tabular, to_tabular, TabularRow, DELIMITER};
pub use writer::{artifact_paths, journal_path, run_stamp, write_artifacts, ExportArtifacts};
