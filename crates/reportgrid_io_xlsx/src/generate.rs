//! Top-level report-to-workbook entry points.

use std::fs;
use std::path::Path;

use reportgrid_layout::{
    EventSink, SpecLayoutOptions, SpecLayoutReport, SpecSourceDocument, SpecWorkbookLayout,
    build_workbook_layout,
};

use crate::spec::{SpecXlsxReport, SpecXlsxWriteOptions, XlsxGenerateError};
use crate::util::derive_partial_path;
use crate::writer::XlsxWriter;

/// Lay out `documents` and write them to `path_file_out`.
///
/// Returns the layout report and the write report. On error no file is
/// left at `path_file_out` by this call.
pub fn write_reports_to_xlsx<P>(
    path_file_out: P,
    documents: &[SpecSourceDocument],
    layout_options: &SpecLayoutOptions,
    write_options: &SpecXlsxWriteOptions,
    sink: &dyn EventSink,
) -> Result<(SpecLayoutReport, SpecXlsxReport), XlsxGenerateError>
where
    P: AsRef<Path>,
{
    let workbook_layout = build_workbook_layout(documents, layout_options, sink)?;
    let report_xlsx = write_workbook_layout(path_file_out, &workbook_layout, write_options, sink)?;
    Ok((workbook_layout.report, report_xlsx))
}

/// Write an already laid-out workbook.
///
/// The workbook is saved to a sibling `.partial` file and renamed over
/// `path_file_out` only after a successful save.
pub fn write_workbook_layout<P>(
    path_file_out: P,
    workbook_layout: &SpecWorkbookLayout,
    write_options: &SpecXlsxWriteOptions,
    sink: &dyn EventSink,
) -> Result<SpecXlsxReport, XlsxGenerateError>
where
    P: AsRef<Path>,
{
    let path_file_out = path_file_out.as_ref().to_path_buf();
    let path_file_partial = derive_partial_path(&path_file_out);

    let res_write = write_sheets(&path_file_partial, workbook_layout, write_options, sink);
    let mut report = match res_write {
        Ok(report) => report,
        Err(message) => {
            discard_partial_file(&path_file_partial);
            return Err(XlsxGenerateError::Write {
                path: path_file_out,
                message,
            });
        }
    };

    if let Err(source) = fs::rename(&path_file_partial, &path_file_out) {
        discard_partial_file(&path_file_partial);
        return Err(XlsxGenerateError::Finalize {
            path: path_file_out,
            source,
        });
    }

    report.path_file_out = path_file_out;
    for c_warning in &report.warnings {
        log::warn!("{c_warning}");
    }
    log::info!("{report}");
    Ok(report)
}

fn write_sheets(
    path_file_partial: &Path,
    workbook_layout: &SpecWorkbookLayout,
    write_options: &SpecXlsxWriteOptions,
    sink: &dyn EventSink,
) -> Result<SpecXlsxReport, String> {
    let mut writer = XlsxWriter::new(path_file_partial.to_path_buf(), write_options.clone())?;
    for grid in &workbook_layout.sheets {
        writer.write_sheet_grid(grid, sink)?;
    }
    writer.close()?;
    Ok(writer.into_report())
}

fn discard_partial_file(path_file_partial: &Path) {
    if path_file_partial.exists()
        && let Err(e) = fs::remove_file(path_file_partial)
    {
        log::warn!(
            "Failed to remove partial workbook {} ({e})",
            path_file_partial.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::path::Path;

    use reportgrid_layout::{
        CollectEventSink, EnumTitleCollisionPolicy, LayoutEvent, NullEventSink,
        SpecLayoutOptions, SpecSourceDocument,
    };
    use serde_json::json;

    use super::*;

    fn read_zip_entry(path: &Path, name: &str) -> String {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut c_text = String::new();
        entry.read_to_string(&mut c_text).unwrap();
        c_text
    }

    fn documents() -> Vec<SpecSourceDocument> {
        vec![
            SpecSourceDocument::new(
                "TR001.json",
                json!({
                    "title": "Tests",
                    "fields": {
                        "Supply": "230 Vac",
                        "Test Date": "2024-04-22",
                        "Readings": [1, 2, 3]
                    }
                }),
            ),
            SpecSourceDocument::new(
                "TR002.json",
                json!({
                    "title": "Tests",
                    "fields": {"Info": [{"Owner": "lab", "Room": 4}]}
                }),
            ),
        ]
    }

    #[test]
    fn test_write_reports_to_xlsx_writes_header_merges_and_typed_cells() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file_out = tmp.path().join("out.xlsx");
        let sink = CollectEventSink::new();

        let (report_layout, report_xlsx) = write_reports_to_xlsx(
            &path_file_out,
            &documents(),
            &SpecLayoutOptions::default(),
            &SpecXlsxWriteOptions::default(),
            &sink,
        )
        .unwrap();

        assert!(path_file_out.is_file());
        assert!(!derive_partial_path(&path_file_out).exists());
        assert_eq!(report_layout.cnt_reports, 2);
        assert_eq!(report_xlsx.sheets.len(), 1);
        assert_eq!(report_xlsx.sheets[0].n_rows_header, 2);
        assert_eq!(report_xlsx.sheets[0].n_rows_data, 2);
        assert_eq!(report_xlsx.path_file_out, path_file_out);
        assert!(sink.events().contains(&LayoutEvent::SheetWritten {
            sheet_name: "Tests".to_string(),
            n_rows: 2,
        }));

        // Columns: File Name | Info(Owner, Room) | Readings(#1..#3) | Supply | Test Date
        let c_sheet = read_zip_entry(&path_file_out, "xl/worksheets/sheet1.xml");
        assert!(c_sheet.contains(r#"<mergeCell ref="B1:C1"/>"#));
        assert!(c_sheet.contains(r#"<mergeCell ref="D1:F1"/>"#));
        assert!(c_sheet.contains("<v>230</v>"));
        assert!(c_sheet.contains("<v>45404</v>"));
        assert!(c_sheet.contains(r#"state="frozen""#));

        let c_strings = read_zip_entry(&path_file_out, "xl/sharedStrings.xml");
        for c_text in ["File Name", "Readings - #1", "Owner", "TR001", "lab"] {
            assert!(c_strings.contains(c_text), "missing {c_text}");
        }

        let c_workbook = read_zip_entry(&path_file_out, "xl/workbook.xml");
        assert!(c_workbook.contains(r#"name="Tests""#));
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file_out = tmp.path().join("missing_dir").join("out.xlsx");

        let res = write_reports_to_xlsx(
            &path_file_out,
            &documents(),
            &SpecLayoutOptions::default(),
            &SpecXlsxWriteOptions::default(),
            &NullEventSink,
        );

        assert!(matches!(res, Err(XlsxGenerateError::Write { .. })));
        assert!(!path_file_out.exists());
        assert!(!derive_partial_path(&path_file_out).exists());
    }

    #[test]
    fn test_layout_error_is_propagated() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file_out = tmp.path().join("out.xlsx");
        let l_documents = vec![
            SpecSourceDocument::new("a.json", json!({"title": "A/B", "x": 1})),
            SpecSourceDocument::new("b.json", json!({"title": "AB", "x": 2})),
        ];
        let layout_options = SpecLayoutOptions {
            rule_title_collision: EnumTitleCollisionPolicy::Error,
            ..SpecLayoutOptions::default()
        };

        let res = write_reports_to_xlsx(
            &path_file_out,
            &l_documents,
            &layout_options,
            &SpecXlsxWriteOptions::default(),
            &NullEventSink,
        );

        assert!(matches!(res, Err(XlsxGenerateError::Layout(_))));
        assert!(!path_file_out.exists());
    }

    #[test]
    fn test_apostrophe_wrapped_title_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file_out = tmp.path().join("quoted.xlsx");
        let l_documents = vec![
            SpecSourceDocument::new("a.json", json!({"title": "Good", "x": 1})),
            SpecSourceDocument::new("b.json", json!({"title": "'Quoted'", "x": 2})),
        ];

        let (report_layout, report_xlsx) = write_reports_to_xlsx(
            &path_file_out,
            &l_documents,
            &SpecLayoutOptions::default(),
            &SpecXlsxWriteOptions::default(),
            &NullEventSink,
        )
        .unwrap();

        assert!(path_file_out.is_file());
        assert_eq!(report_layout.sheets, vec!["Good", "Quoted"]);
        assert_eq!(report_xlsx.sheets.len(), 2);

        let c_workbook = read_zip_entry(&path_file_out, "xl/workbook.xml");
        assert!(c_workbook.contains(r#"name="Good""#));
        assert!(c_workbook.contains(r#"name="Quoted""#));
    }

    #[test]
    fn test_empty_input_writes_placeholder_sheet() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file_out = tmp.path().join("empty.xlsx");

        let report = write_workbook_layout(
            &path_file_out,
            &SpecWorkbookLayout::default(),
            &SpecXlsxWriteOptions::default(),
            &NullEventSink,
        )
        .unwrap();

        assert!(path_file_out.is_file());
        assert!(report.sheets.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }
}
