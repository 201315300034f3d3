//! XLSX constants and default preset factories.

use crate::spec::{SpecCellFormat, SpecXlsxFormats};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel column width upper bound.
pub const N_WIDTH_EXCEL_COL_MAX: usize = 255;
/// Display format of date cells.
pub const C_DATE_NUM_FORMAT: &str = "yyyy-mm-dd";
/// Suffix of the temporary file a workbook is saved to before the final rename.
pub const C_PARTIAL_SUFFIX: &str = "partial";

/// Build default named format presets used by [`crate::writer::XlsxWriter`].
///
/// Body cells stay unstyled; header and subtitle rows are bold, filled and
/// thin-bordered.
pub fn derive_default_xlsx_formats() -> SpecXlsxFormats {
    let cfg_header_base = SpecCellFormat {
        bold: Some(true),
        border: Some(1),
        align: Some("center".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    SpecXlsxFormats {
        text: SpecCellFormat::default(),
        number: SpecCellFormat::default(),
        date: SpecCellFormat {
            num_format: Some(C_DATE_NUM_FORMAT.to_string()),
            ..Default::default()
        },
        header: cfg_header_base.with_(SpecCellFormat {
            bg_color: Some("#DDDDDD".to_string()),
            ..Default::default()
        }),
        subtitle: cfg_header_base.with_(SpecCellFormat {
            italic: Some(true),
            bg_color: Some("#EEEEEE".to_string()),
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_formats_distinguish_header_rows() {
        let formats = derive_default_xlsx_formats();
        assert_eq!(formats.header.bold, Some(true));
        assert_eq!(formats.header.italic, None);
        assert_eq!(formats.subtitle.italic, Some(true));
        assert_eq!(formats.subtitle.border, Some(1));
        assert_eq!(formats.date.num_format.as_deref(), Some(C_DATE_NUM_FORMAT));
        assert_eq!(formats.text, SpecCellFormat::default());
    }
}
