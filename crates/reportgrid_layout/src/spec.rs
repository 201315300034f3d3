//! Shared layout specification models.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::conf::{
    C_DATE_FIELD_MARKER, C_DEFAULT_TITLE_PREFIX, C_IDENTIFIER_HEADER, derive_default_date_formats,
    derive_default_unit_patterns,
};
use crate::util::calculate_total_columns;

////////////////////////////////////////////////////////////////////////////////
// #region FieldShapes

/// Closed shape kind of one field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumShapeKind {
    /// String, number, boolean or null.
    Scalar,
    /// Flat or nested list of scalars.
    NestedList,
    /// List of mappings sharing one key set.
    KeyValueList,
    /// Key-value list with at least one mapping-valued key.
    NestedKeyValueList,
}

impl fmt::Display for EnumShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_name = match self {
            Self::Scalar => "scalar",
            Self::NestedList => "nested-list",
            Self::KeyValueList => "key-value-list",
            Self::NestedKeyValueList => "nested-key-value-list",
        };
        write!(f, "{c_name}")
    }
}

/// Layout metadata of a (possibly nested) list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecListShape {
    /// Size at each nesting level (widest seen).
    pub dimensions: Vec<usize>,
}

impl SpecListShape {
    /// Number of list levels.
    pub fn depth(&self) -> usize {
        self.dimensions.len()
    }

    /// Number of columns reserved for this list.
    pub fn width(&self) -> usize {
        calculate_total_columns(&self.dimensions)
    }
}

/// One flattened path inside a nested key-value item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpecNestedPath {
    /// Dotted display path, including the top-level key (`b.x`).
    pub path: String,
    /// Path segments, including the top-level key.
    pub segments: Vec<String>,
}

impl SpecNestedPath {
    /// Build from segments.
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self {
            path: segments.join("."),
            segments,
        }
    }

    /// Leaf property name (last segment).
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

/// Ordered registry of nested paths under one key-value key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecNestedPaths {
    /// Paths sorted by segments; sub-mappings stay contiguous.
    pub paths: Vec<SpecNestedPath>,
}

/// Layout metadata of a key-value list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecKeyValueShape {
    /// Sorted union of item keys.
    pub unique_keys: Vec<String>,
    /// Keys whose representative value is a mapping, flattened to paths.
    pub nested_structure: BTreeMap<String, SpecNestedPaths>,
}

impl SpecKeyValueShape {
    /// Number of columns reserved for one key.
    pub fn width_of_key(&self, key: &str) -> usize {
        self.nested_structure
            .get(key)
            .map_or(1, |nested| usize::max(1, nested.paths.len()))
    }

    /// Number of columns reserved for this key-value list.
    pub fn width(&self) -> usize {
        let n_width: usize = self
            .unique_keys
            .iter()
            .map(|key| self.width_of_key(key))
            .sum();
        usize::max(1, n_width)
    }

    /// Whether any key is flattened into sub-paths.
    pub fn is_nested(&self) -> bool {
        self.nested_structure
            .values()
            .any(|nested| !nested.paths.is_empty())
    }
}

/// Shape of one field, produced once by classification and consumed everywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumFieldShape {
    /// Single cell value.
    Scalar,
    /// Flat or nested list.
    List(SpecListShape),
    /// List of mappings with consistent keys.
    KeyValueList(SpecKeyValueShape),
}

impl EnumFieldShape {
    /// Closed kind tag.
    pub fn kind(&self) -> EnumShapeKind {
        match self {
            Self::Scalar => EnumShapeKind::Scalar,
            Self::List(_) => EnumShapeKind::NestedList,
            Self::KeyValueList(kv) if kv.is_nested() => EnumShapeKind::NestedKeyValueList,
            Self::KeyValueList(_) => EnumShapeKind::KeyValueList,
        }
    }

    /// Number of columns reserved for this field.
    pub fn width(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::List(list) => list.width(),
            Self::KeyValueList(kv) => kv.width(),
        }
    }

    /// Subtitle rows this field needs below the top header row.
    pub fn subtitle_rows(&self) -> usize {
        match self {
            Self::Scalar => 0,
            Self::List(list) if list.width() > 1 => list.depth(),
            Self::List(_) => 0,
            Self::KeyValueList(kv) if kv.is_nested() => 2,
            Self::KeyValueList(_) => 1,
        }
    }

    /// Whether this field requires subtitle rows.
    pub fn needs_subtitles(&self) -> bool {
        self.subtitle_rows() > 0
    }

    /// Level-wise dimensions (`[]` for non-list shapes).
    pub fn dimensions(&self) -> &[usize] {
        match self {
            Self::List(list) => &list.dimensions,
            _ => &[],
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetSchema

/// Superset schema of every report contributing to one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSheetSchema {
    /// Field name -> merged shape, iterated in lexicographic order.
    pub fields: BTreeMap<String, EnumFieldShape>,
    /// True if any merged field needs more than the top header row.
    pub needs_subtitles: bool,
}

impl SpecSheetSchema {
    /// Tallest subtitle block across all fields.
    pub fn subtitle_rows(&self) -> usize {
        self.fields
            .values()
            .map(EnumFieldShape::subtitle_rows)
            .max()
            .unwrap_or(0)
    }

    /// Total column count including the identifier column.
    pub fn column_count(&self) -> usize {
        1 + self.fields.values().map(EnumFieldShape::width).sum::<usize>()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetLayout

/// Column range assigned to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFieldColumns {
    /// Field name.
    pub name: String,
    /// First column index (0-based; column 0 is the identifier).
    pub col_idx_start: usize,
    /// Number of columns.
    pub width: usize,
    /// Frozen field shape.
    pub shape: EnumFieldShape,
}

impl SpecFieldColumns {
    /// Exclusive end column index.
    pub fn col_idx_end_exclusive(&self) -> usize {
        self.col_idx_start + self.width
    }
}

/// Horizontal merge plan item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetHorizontalMerge {
    /// Row index where merge is applied.
    pub row_idx: usize,
    /// Start column index (inclusive).
    pub col_idx_start: usize,
    /// End column index (inclusive).
    pub col_idx_end: usize,
    /// Merge display text.
    pub text: String,
}

/// Frozen column layout and header block of one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetLayout {
    /// Sanitized sheet name.
    pub sheet_name: String,
    /// Field column ranges in lexicographic field order.
    pub columns: Vec<SpecFieldColumns>,
    /// `n_rows_header x n_cols` header text; row 0 is the top header.
    pub header_grid: Vec<Vec<String>>,
    /// Merged header ranges.
    pub merges: Vec<SpecSheetHorizontalMerge>,
    /// Total column count including the identifier column.
    pub n_cols: usize,
    /// Header row count (top header + subtitle rows).
    pub n_rows_header: usize,
}

/// Typed cell value produced by the row renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Blank cell (empty string or missing value).
    Empty,
    /// Text value.
    String(String),
    /// Whole number.
    Integer(i64),
    /// Fractional number.
    Float(f64),
    /// Calendar date.
    Date(NaiveDate),
}

impl EnumCellValue {
    /// Text as shown for width estimation.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::String(val) => val.clone(),
            Self::Integer(val) => val.to_string(),
            Self::Float(val) => val.to_string(),
            Self::Date(val) => val.format("%Y-%m-%d").to_string(),
        }
    }

    /// Whether this is a blank cell.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// One physical sheet: frozen layout plus appended rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSheetGrid {
    /// Frozen layout, planned once at creation.
    pub layout: SpecSheetLayout,
    /// Data rows in report encounter order.
    pub rows: Vec<Vec<EnumCellValue>>,
}

impl SpecSheetGrid {
    /// Create an empty sheet for `layout`.
    pub fn new(layout: SpecSheetLayout) -> Self {
        Self {
            layout,
            rows: Vec::new(),
        }
    }

    /// Next free 0-based row index (after header block and written rows).
    pub fn row_cursor(&self) -> usize {
        self.layout.n_rows_header + self.rows.len()
    }

    /// Append one rendered row; returns the row index it was written at.
    pub fn append_row(&mut self, row: Vec<EnumCellValue>) -> usize {
        debug_assert_eq!(row.len(), self.layout.n_cols);
        let n_row_idx = self.row_cursor();
        self.rows.push(row);
        n_row_idx
    }
}

/// Fully laid-out workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecWorkbookLayout {
    /// Sheets in creation order.
    pub sheets: Vec<SpecSheetGrid>,
    /// Run report.
    pub report: SpecLayoutReport,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region InputsAndReport

/// One loaded source document (e.g. a JSON file).
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSourceDocument {
    /// Source identifier, typically a relative file path.
    pub source_id: String,
    /// Parsed document: a report object or a list of report objects.
    pub value: Value,
}

impl SpecSourceDocument {
    /// Create a document.
    pub fn new(source_id: impl Into<String>, value: Value) -> Self {
        Self {
            source_id: source_id.into(),
            value,
        }
    }
}

/// Counters and warnings of one layout run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecLayoutReport {
    /// Number of source documents.
    pub cnt_documents: u64,
    /// Number of reports (rows) processed.
    pub cnt_reports: u64,
    /// Number of reports without a field mapping.
    pub cnt_degenerate: u64,
    /// Sheet names in creation order.
    pub sheets: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecLayoutReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} documents={} reports={} degenerate={} sheets={} warnings={}",
            self.cnt_documents,
            self.cnt_reports,
            self.cnt_degenerate,
            self.sheets.len(),
            self.warnings.len()
        )
    }
}

impl fmt::Display for SpecLayoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[LAYOUT]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Policy when two distinct titles sanitize to the same sheet name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumTitleCollisionPolicy {
    /// Share one sheet; a warning is always reported.
    #[default]
    Merge,
    /// Give later titles a `_2`, `_3`, ... suffix.
    Suffix,
    /// Abort the run.
    Error,
}

/// Per-cell value conversion policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecValuePolicy {
    /// Replace `,` with `.` before typing.
    pub if_replace_commas: bool,
    /// Strip unit substrings before typing.
    pub if_strip_units: bool,
    /// Unit regex patterns, applied in order.
    pub unit_patterns: Vec<String>,
    /// Case-insensitive substring marking date fields.
    pub date_field_marker: String,
    /// Ordered chrono date patterns.
    pub date_formats: Vec<String>,
    /// Accept 8-digit `YYYYMMDD` in date fields.
    pub if_parse_compact_dates: bool,
}

impl Default for SpecValuePolicy {
    fn default() -> Self {
        Self {
            if_replace_commas: false,
            if_strip_units: true,
            unit_patterns: derive_default_unit_patterns(),
            date_field_marker: C_DATE_FIELD_MARKER.to_string(),
            date_formats: derive_default_date_formats(),
            if_parse_compact_dates: true,
        }
    }
}

/// Workbook layout options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecLayoutOptions {
    /// Header text of the identifier column.
    pub identifier_header: String,
    /// Substring removed from display identifiers.
    pub filter_text: String,
    /// Prefix of generated titles for untitled reports.
    pub default_title_prefix: String,
    /// Cell value conversion policy.
    pub value_policy: SpecValuePolicy,
    /// Sheet-title collision policy.
    pub rule_title_collision: EnumTitleCollisionPolicy,
}

impl Default for SpecLayoutOptions {
    fn default() -> Self {
        Self {
            identifier_header: C_IDENTIFIER_HEADER.to_string(),
            filter_text: String::new(),
            default_title_prefix: C_DEFAULT_TITLE_PREFIX.to_string(),
            value_policy: SpecValuePolicy::default(),
            rule_title_collision: EnumTitleCollisionPolicy::Merge,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// "Layout run failed" errors.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// A configured regex pattern does not compile.
    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },
    /// Two distinct titles map to one sheet under the `error` policy.
    #[error("Sheet title collision: {title_current:?} and {title_first:?} both map to sheet {sheet_name:?}")]
    TitleCollision {
        /// Shared sanitized sheet name.
        sheet_name: String,
        /// Title that claimed the sheet first.
        title_first: String,
        /// Title that collided.
        title_current: String,
    },
    /// Pass 2 reached a sheet that pass 1 never analyzed.
    #[error("No schema was accumulated for sheet {0:?}")]
    MissingSchema(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_width_counts_nested_paths() {
        let mut nested_structure = BTreeMap::new();
        nested_structure.insert(
            "b".to_string(),
            SpecNestedPaths {
                paths: vec![
                    SpecNestedPath::from_segments(vec!["b".to_string(), "x".to_string()]),
                    SpecNestedPath::from_segments(vec!["b".to_string(), "y".to_string()]),
                ],
            },
        );
        let shape = EnumFieldShape::KeyValueList(SpecKeyValueShape {
            unique_keys: vec!["a".to_string(), "b".to_string()],
            nested_structure,
        });

        assert_eq!(shape.width(), 3);
        assert_eq!(shape.kind(), EnumShapeKind::NestedKeyValueList);
        assert_eq!(shape.subtitle_rows(), 2);
    }

    #[test]
    fn test_list_width_floors_empty_levels() {
        let shape = EnumFieldShape::List(SpecListShape {
            dimensions: vec![0],
        });
        assert_eq!(shape.width(), 1);
        assert!(!shape.needs_subtitles());

        let shape = EnumFieldShape::List(SpecListShape {
            dimensions: vec![2, 0, 3],
        });
        assert_eq!(shape.width(), 6);
        assert_eq!(shape.subtitle_rows(), 3);
    }

    #[test]
    fn test_report_format_is_one_line() {
        let report = SpecLayoutReport {
            cnt_documents: 2,
            cnt_reports: 3,
            cnt_degenerate: 1,
            sheets: vec!["A".to_string()],
            warnings: vec![],
        };
        assert_eq!(
            report.to_string(),
            "[LAYOUT] documents=2 reports=3 degenerate=1 sheets=1 warnings=0"
        );
    }
}
