//! XLSX writer kernel that renders finalized sheet grids into a workbook.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::Datelike;
use reportgrid_layout::{
    EnumCellValue, EventSink, LayoutEvent, N_LEN_EXCEL_SHEET_NAME_MAX, SpecSheetGrid,
    SpecSheetLayout,
};
use rust_xlsxwriter::{
    ExcelDateTime, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError,
};

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{
    EnumAutofitColumnsRule, SpecAutofitCellsPolicy, SpecCellFormat, SpecSheetWritten,
    SpecXlsxReport, SpecXlsxWriteOptions,
};
use crate::util::{
    calculate_autofit_width, derive_horizontal_merge_tracker, derive_horizontal_merges_by_row,
    estimate_unicode_string_width,
};

/// Stateful workbook writer.
///
/// The workbook is buffered in memory until [`Self::close`] is called.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    fmt_text: Format,
    fmt_number: Format,
    fmt_date: Format,
    fmt_header: Format,
    fmt_subtitle: Format,
    write_options: SpecXlsxWriteOptions,
    set_sheet_names_existing: BTreeSet<String>,
    report: SpecXlsxReport,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path and options.
    pub fn new(path_file_out: PathBuf, write_options: SpecXlsxWriteOptions) -> Result<Self, String> {
        validate_policy_autofit(&write_options.policy_autofit)?;

        let formats = &write_options.formats;
        Ok(Self {
            path_file_out: path_file_out.clone(),
            workbook: Workbook::new(),
            fmt_text: derive_rust_xlsx_format(&formats.text),
            fmt_number: derive_rust_xlsx_format(&formats.number),
            fmt_date: derive_rust_xlsx_format(&formats.date),
            fmt_header: derive_rust_xlsx_format(&formats.header),
            fmt_subtitle: derive_rust_xlsx_format(&formats.subtitle),
            write_options,
            set_sheet_names_existing: BTreeSet::new(),
            report: SpecXlsxReport {
                path_file_out,
                ..SpecXlsxReport::default()
            },
            if_closed: false,
        })
    }

    /// Return output file path as string.
    pub fn file_out(&self) -> String {
        self.path_file_out.to_string_lossy().to_string()
    }

    /// Report of sheets written so far.
    pub fn report(&self) -> &SpecXlsxReport {
        &self.report
    }

    /// Consume the writer and return its report.
    pub fn into_report(self) -> SpecXlsxReport {
        self.report
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), String> {
        if self.if_closed {
            return Ok(());
        }
        if self.report.sheets.is_empty() {
            self.report.warn("No sheets were written; workbook contains one empty sheet.");
            self.workbook.add_worksheet();
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        Ok(())
    }

    /// Write one finalized sheet: header block, merges, typed rows, autofit
    /// and freeze panes.
    pub fn write_sheet_grid(
        &mut self,
        grid: &SpecSheetGrid,
        sink: &dyn EventSink,
    ) -> Result<(), String> {
        if self.if_closed {
            return Err("Cannot write after close().".to_string());
        }

        let layout = &grid.layout;
        let n_rows_total = layout.n_rows_header + grid.rows.len();
        if layout.n_cols > N_NCOLS_EXCEL_MAX {
            return Err(format!(
                "Sheet {:?} needs {} columns; Excel allows {N_NCOLS_EXCEL_MAX}.",
                layout.sheet_name, layout.n_cols
            ));
        }
        if n_rows_total > N_NROWS_EXCEL_MAX {
            return Err(format!(
                "Sheet {:?} needs {n_rows_total} rows; Excel allows {N_NROWS_EXCEL_MAX}.",
                layout.sheet_name
            ));
        }

        let sheet_name_unique = self.derive_unique_sheet_name(&layout.sheet_name);
        let policy_autofit = self.write_options.policy_autofit.clone();
        let if_freeze_header = self.write_options.if_freeze_header;

        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(&sheet_name_unique)
            .map_err(derive_xlsx_error_text)?;

        let mut l_width_by_col_header = vec![0usize; layout.n_cols];
        let mut l_width_by_col_body = vec![0usize; layout.n_cols];

        write_header(
            worksheet,
            layout,
            &self.fmt_header,
            &self.fmt_subtitle,
            &mut l_width_by_col_header,
        )?;

        for (n_row_local, row) in grid.rows.iter().enumerate() {
            let n_row_idx = layout.n_rows_header + n_row_local;
            for (n_idx_col, value) in row.iter().enumerate() {
                let fmt_cell = match value {
                    EnumCellValue::Empty => continue,
                    EnumCellValue::String(_) => &self.fmt_text,
                    EnumCellValue::Integer(_) | EnumCellValue::Float(_) => &self.fmt_number,
                    EnumCellValue::Date(_) => &self.fmt_date,
                };
                write_cell_with_format(worksheet, n_row_idx, n_idx_col, value, fmt_cell)?;

                if let Some(n_width) = l_width_by_col_body.get_mut(n_idx_col) {
                    *n_width = usize::max(
                        *n_width,
                        estimate_unicode_string_width(&value.to_display_string()),
                    );
                }
            }
        }

        if !matches!(policy_autofit.rule_columns, EnumAutofitColumnsRule::None) {
            for n_idx_col in 0..layout.n_cols {
                let n_width_recorded = match policy_autofit.rule_columns {
                    EnumAutofitColumnsRule::Header => l_width_by_col_header[n_idx_col],
                    EnumAutofitColumnsRule::Body => l_width_by_col_body[n_idx_col],
                    EnumAutofitColumnsRule::All | EnumAutofitColumnsRule::None => usize::max(
                        l_width_by_col_header[n_idx_col],
                        l_width_by_col_body[n_idx_col],
                    ),
                };
                let n_width_final = calculate_autofit_width(n_width_recorded, &policy_autofit);
                worksheet
                    .set_column_width(cast_col_num(n_idx_col)?, n_width_final as f64)
                    .map_err(derive_xlsx_error_text)?;
            }
        }

        if if_freeze_header {
            worksheet
                .set_freeze_panes(cast_row_num(layout.n_rows_header)?, 1)
                .map_err(derive_xlsx_error_text)?;
        }

        sink.emit(LayoutEvent::SheetWritten {
            sheet_name: sheet_name_unique.clone(),
            n_rows: grid.rows.len(),
        });
        self.report.sheets.push(SpecSheetWritten {
            sheet_name: sheet_name_unique,
            n_rows_header: layout.n_rows_header,
            n_rows_data: grid.rows.len(),
            n_cols: layout.n_cols,
        });
        Ok(())
    }

    /// Excel compares sheet names case-insensitively.
    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.set_sheet_names_existing.insert(name.to_lowercase()) {
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if self.set_sheet_names_existing.insert(candidate.to_lowercase()) {
                self.report
                    .warn(format!("Sheet name {name:?} already used; renamed to {candidate:?}."));
                return candidate;
            }
            n_idx += 1;
        }
    }
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), String> {
    if policy_autofit.width_cell_min == 0 {
        return Err("policy_autofit.width_cell_min must be >= 1.".to_string());
    }
    if policy_autofit.width_cell_max < policy_autofit.width_cell_min {
        return Err(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.".to_string(),
        );
    }
    Ok(())
}

/// Row 0 uses the header format, subtitle rows the subtitle format. Merged
/// anchors are written through `merge_range`; merged text does not widen
/// its anchor column.
fn write_header(
    worksheet: &mut Worksheet,
    layout: &SpecSheetLayout,
    fmt_header: &Format,
    fmt_subtitle: &Format,
    l_width_by_col_header: &mut [usize],
) -> Result<(), String> {
    let dict_merges_by_row = derive_horizontal_merges_by_row(&layout.merges);
    let set_merged_cells = derive_horizontal_merge_tracker(&layout.merges);
    let set_merge_anchors: BTreeSet<(usize, usize)> = layout
        .merges
        .iter()
        .map(|merge| (merge.row_idx, merge.col_idx_start))
        .collect();

    for (row_idx, row_values) in layout.header_grid.iter().enumerate() {
        let fmt_row = if row_idx == 0 { fmt_header } else { fmt_subtitle };

        for (col_idx, cell_value) in row_values.iter().enumerate() {
            if set_merged_cells.contains(&(row_idx, col_idx))
                || set_merge_anchors.contains(&(row_idx, col_idx))
            {
                continue;
            }

            if cell_value.is_empty() {
                worksheet
                    .write_blank(cast_row_num(row_idx)?, cast_col_num(col_idx)?, fmt_row)
                    .map_err(derive_xlsx_error_text)?;
                continue;
            }

            worksheet
                .write_string_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    cell_value,
                    fmt_row,
                )
                .map_err(derive_xlsx_error_text)?;
            if let Some(n_width) = l_width_by_col_header.get_mut(col_idx) {
                *n_width = usize::max(*n_width, estimate_unicode_string_width(cell_value));
            }
        }

        if let Some(l_merges) = dict_merges_by_row.get(&row_idx) {
            for merge in l_merges {
                worksheet
                    .merge_range(
                        cast_row_num(row_idx)?,
                        cast_col_num(merge.col_idx_start)?,
                        cast_row_num(row_idx)?,
                        cast_col_num(merge.col_idx_end)?,
                        &merge.text,
                        fmt_row,
                    )
                    .map_err(derive_xlsx_error_text)?;
            }
        }
    }

    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), String> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::Empty => {
            worksheet
                .write_blank(n_row, n_col, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::String(val) => {
            worksheet
                .write_string_with_format(n_row, n_col, val, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Integer(val) => {
            worksheet
                .write_number_with_format(n_row, n_col, *val as f64, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Float(val) => {
            worksheet
                .write_number_with_format(n_row, n_col, *val, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Date(val) => {
            let dt_excel = derive_excel_date(val.year(), val.month(), val.day())?;
            worksheet
                .write_datetime_with_format(n_row, n_col, &dt_excel, format)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn derive_excel_date(n_year: i32, n_month: u32, n_day: u32) -> Result<ExcelDateTime, String> {
    let n_year = u16::try_from(n_year).map_err(|_| format!("date year out of range: {n_year}"))?;
    let n_month = u8::try_from(n_month).map_err(|_| format!("date month out of range: {n_month}"))?;
    let n_day = u8::try_from(n_day).map_err(|_| format!("date day out of range: {n_day}"))?;
    ExcelDateTime::from_ymd(n_year, n_month, n_day).map_err(derive_xlsx_error_text)
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_valign(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

/// Horizontal alignment only; vertical names are rejected here.
fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        _ => None,
    }
}

fn derive_format_valign(valign: &str) -> Option<FormatAlign> {
    let value = valign.trim().to_ascii_lowercase();
    match value.as_str() {
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "center" | "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "justify" | "vjustify" => Some(FormatAlign::VerticalJustify),
        "distributed" | "vdistributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

#[cfg(test)]
mod tests {
    use reportgrid_layout::{CollectEventSink, NullEventSink, SpecSheetLayout};

    use super::*;

    fn grid_of(sheet_name: &str, n_rows: usize) -> SpecSheetGrid {
        let layout = SpecSheetLayout {
            sheet_name: sheet_name.to_string(),
            columns: vec![],
            header_grid: vec![vec!["File Name".to_string()]],
            merges: vec![],
            n_cols: 1,
            n_rows_header: 1,
        };
        let mut grid = SpecSheetGrid::new(layout);
        for n_idx in 0..n_rows {
            grid.append_row(vec![EnumCellValue::String(format!("r{n_idx}"))]);
        }
        grid
    }

    #[test]
    fn test_write_sheet_grid_reports_and_emits() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = XlsxWriter::new(
            tmp.path().join("out.xlsx"),
            SpecXlsxWriteOptions::default(),
        )
        .unwrap();
        let sink = CollectEventSink::new();

        writer.write_sheet_grid(&grid_of("Tests", 2), &sink).unwrap();
        writer.close().unwrap();

        assert_eq!(writer.report().sheets[0].n_rows_data, 2);
        assert_eq!(
            sink.events(),
            vec![LayoutEvent::SheetWritten {
                sheet_name: "Tests".to_string(),
                n_rows: 2,
            }]
        );
        assert!(tmp.path().join("out.xlsx").is_file());
    }

    #[test]
    fn test_duplicate_sheet_names_are_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = XlsxWriter::new(
            tmp.path().join("out.xlsx"),
            SpecXlsxWriteOptions::default(),
        )
        .unwrap();

        writer.write_sheet_grid(&grid_of("Tests", 0), &NullEventSink).unwrap();
        writer.write_sheet_grid(&grid_of("TESTS", 0), &NullEventSink).unwrap();

        let l_names: Vec<&str> = writer
            .report()
            .sheets
            .iter()
            .map(|sheet| sheet.sheet_name.as_str())
            .collect();
        assert_eq!(l_names, vec!["Tests", "TESTS__2"]);
        assert_eq!(writer.report().warnings.len(), 1);
    }

    #[test]
    fn test_write_after_close_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = XlsxWriter::new(
            tmp.path().join("out.xlsx"),
            SpecXlsxWriteOptions::default(),
        )
        .unwrap();
        writer.close().unwrap();
        assert!(writer.close().is_ok());
        assert!(writer.write_sheet_grid(&grid_of("A", 1), &NullEventSink).is_err());
    }

    #[test]
    fn test_invalid_autofit_policy_is_rejected() {
        let mut write_options = SpecXlsxWriteOptions::default();
        write_options.policy_autofit.width_cell_min = 0;
        assert!(XlsxWriter::new(PathBuf::from("x.xlsx"), write_options).is_err());
    }

    #[test]
    fn test_alignment_names_map_to_their_axis() {
        assert_eq!(derive_format_align("Center"), Some(FormatAlign::Center));
        assert_eq!(derive_format_align("vcenter"), None);
        assert_eq!(derive_format_align("top"), None);

        assert_eq!(derive_format_valign("vcenter"), Some(FormatAlign::VerticalCenter));
        assert_eq!(derive_format_valign("center"), Some(FormatAlign::VerticalCenter));
        assert_eq!(derive_format_valign("top"), Some(FormatAlign::Top));
        assert_eq!(derive_format_valign("left"), None);
    }

    #[test]
    fn test_valign_keeps_horizontal_alignment() {
        let spec = SpecCellFormat {
            align: Some("center".to_string()),
            valign: Some("vcenter".to_string()),
            ..SpecCellFormat::default()
        };
        let expected = Format::new()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        assert_eq!(derive_rust_xlsx_format(&spec), expected);

        let spec_left = SpecCellFormat {
            align: Some("left".to_string()),
            valign: Some("left".to_string()),
            ..SpecCellFormat::default()
        };
        assert_eq!(
            derive_rust_xlsx_format(&spec_left),
            Format::new().set_align(FormatAlign::Left)
        );
    }

    #[test]
    fn test_excel_date_rejects_out_of_range_year() {
        assert!(derive_excel_date(2024, 4, 22).is_ok());
        assert!(derive_excel_date(-5, 1, 1).is_err());
    }
}
