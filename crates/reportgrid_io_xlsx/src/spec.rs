//! Shared XLSX specification models.

use std::fmt;
use std::path::PathBuf;

use reportgrid_layout::LayoutError;
use serde::Deserialize;

use crate::conf::derive_default_xlsx_formats;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification; every property is optional and unset
/// properties keep the workbook default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Named format presets, one per cell role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecXlsxFormats {
    /// Text body cells.
    pub text: SpecCellFormat,
    /// Numeric body cells.
    pub number: SpecCellFormat,
    /// Date body cells; should carry a date `num_format`.
    pub date: SpecCellFormat,
    /// Top header row.
    pub header: SpecCellFormat,
    /// Subtitle rows below the top header.
    pub subtitle: SpecCellFormat,
}

impl Default for SpecXlsxFormats {
    fn default() -> Self {
        derive_default_xlsx_formats()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from both header and body cells (default).
    #[default]
    All,
}

/// Autofit policy applied after all rows of a sheet are written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecAutofitCellsPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecXlsxWriteOptions {
    /// Cell format presets.
    pub formats: SpecXlsxFormats,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Freeze panes below the header block and right of the identifier column.
    pub if_freeze_header: bool,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            formats: SpecXlsxFormats::default(),
            policy_autofit: SpecAutofitCellsPolicy::default(),
            if_freeze_header: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// One sheet emitted to the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetWritten {
    /// Actual unique sheet name in workbook.
    pub sheet_name: String,
    /// Header row count.
    pub n_rows_header: usize,
    /// Data row count.
    pub n_rows_data: usize,
    /// Column count including the identifier column.
    pub n_cols: usize,
}

/// Per-workbook write report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Output file path.
    pub path_file_out: PathBuf,
    /// Sheets in workbook order.
    pub sheets: Vec<SpecSheetWritten>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Total data rows across sheets.
    pub fn cnt_rows(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.n_rows_data).sum()
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} file={} sheets={} rows={} warnings={}",
            self.path_file_out.display(),
            self.sheets.len(),
            self.cnt_rows(),
            self.warnings.len()
        )
    }
}

impl fmt::Display for SpecXlsxReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[XLSX]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// "Workbook not produced" errors. A returned error means no file was left
/// at the target path by this call.
#[derive(Debug, thiserror::Error)]
pub enum XlsxGenerateError {
    /// Layout construction failed.
    #[error("Layout failed: {0}")]
    Layout(#[from] LayoutError),
    /// Writing or saving the workbook failed.
    #[error("Failed to write workbook {path}: {message}")]
    Write {
        /// Target file path.
        path: PathBuf,
        /// Writer message.
        message: String,
    },
    /// Moving the finished workbook into place failed.
    #[error("Failed to finalize workbook {path}: {source}")]
    Finalize {
        /// Target file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
