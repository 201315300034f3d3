//! `reportgrid_io_xlsx` v1:
//! Render laid-out report sheets into an `.xlsx` workbook.
//!
//! Module map:
//! - `conf`     : constants and default presets
//! - `spec`     : formats/options/report/errors
//! - `util`     : pure helper functions
//! - `writer`   : rust_xlsxwriter-backed writer kernel
//! - `generate` : documents -> layout -> workbook entry points
pub mod conf;
pub mod generate;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, derive_default_xlsx_formats};
pub use generate::{write_reports_to_xlsx, write_workbook_layout};
pub use spec::{
    EnumAutofitColumnsRule, SpecAutofitCellsPolicy, SpecCellFormat, SpecSheetWritten,
    SpecXlsxFormats, SpecXlsxReport, SpecXlsxWriteOptions, XlsxGenerateError,
};
pub use writer::XlsxWriter;
