//! `reportgrid_io_json` v1:
//! Loads extracted report documents from a directory tree of JSON files.
//!
//! - `read`   : traversal and parallel parsing
//! - `spec`   : options/errors
//! - `report` : run-time report model
//! - `util`   : pattern helpers

pub mod read;
pub mod report;
pub mod spec;
mod util;

pub use read::read_json_documents;
pub use report::{ReportReadJson, ReportReadJsonBuilder};
pub use spec::{ReadJsonError, SpecReadJsonError, SpecReadJsonOptions};
