//! Two-pass workbook orchestration.
//!
//! Pass 1 classifies every report and accumulates one schema per sheet.
//! Pass 2 plans each sheet once (on first encounter) and renders one row per
//! report in original encounter order.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::classify::classify_fields;
use crate::event::{EventSink, LayoutEvent};
use crate::plan::plan_sheet_layout;
use crate::render::render_row;
use crate::schema::SchemaAccumulator;
use crate::spec::{
    EnumTitleCollisionPolicy, LayoutError, SpecLayoutOptions, SpecLayoutReport, SpecSheetGrid,
    SpecSourceDocument, SpecWorkbookLayout,
};
use crate::util::{create_sheet_identifier, derive_display_identifier, sanitize_sheet_name};
use crate::value::SpecValueFilters;

/// One report resolved to its sheet.
#[derive(Debug)]
struct SpecReportEntry<'a> {
    source_id: &'a str,
    sheet_name: String,
    fields: Option<&'a Map<String, Value>>,
}

/// Title -> sheet name registry applying the collision policy.
#[derive(Debug, Default)]
struct SheetNameRegistry {
    /// Logical title -> resolved sheet name.
    dict_title_to_sheet: HashMap<String, String>,
    /// Lowercased sheet name -> first title that claimed it.
    dict_sheet_owner: HashMap<String, String>,
}

impl SheetNameRegistry {
    fn resolve(
        &mut self,
        title: &str,
        rule: EnumTitleCollisionPolicy,
        report: &mut SpecLayoutReport,
        sink: &dyn EventSink,
    ) -> Result<String, LayoutError> {
        if let Some(c_sheet_name) = self.dict_title_to_sheet.get(title) {
            return Ok(c_sheet_name.clone());
        }

        let c_sheet_name_base = sanitize_sheet_name(title);
        let c_sheet_name = match self.dict_sheet_owner.get(&c_sheet_name_base.to_lowercase()) {
            None => c_sheet_name_base,
            Some(c_title_first) => {
                let c_title_first = c_title_first.clone();
                sink.emit(LayoutEvent::TitleCollision {
                    sheet_name: c_sheet_name_base.clone(),
                    title_first: c_title_first.clone(),
                    title_current: title.to_string(),
                });
                match rule {
                    EnumTitleCollisionPolicy::Merge => {
                        report.warn(format!(
                            "Title {title:?} shares sheet {c_sheet_name_base:?} with {c_title_first:?}."
                        ));
                        c_sheet_name_base
                    }
                    EnumTitleCollisionPolicy::Suffix => {
                        let c_sheet_name_new = self.derive_free_suffix(&c_sheet_name_base);
                        report.warn(format!(
                            "Title {title:?} collides with {c_title_first:?}; using sheet {c_sheet_name_new:?}."
                        ));
                        c_sheet_name_new
                    }
                    EnumTitleCollisionPolicy::Error => {
                        return Err(LayoutError::TitleCollision {
                            sheet_name: c_sheet_name_base,
                            title_first: c_title_first,
                            title_current: title.to_string(),
                        });
                    }
                }
            }
        };

        self.dict_sheet_owner
            .entry(c_sheet_name.to_lowercase())
            .or_insert_with(|| title.to_string());
        self.dict_title_to_sheet
            .insert(title.to_string(), c_sheet_name.clone());
        Ok(c_sheet_name)
    }

    fn derive_free_suffix(&self, base_name: &str) -> String {
        let mut n_idx = 2;
        loop {
            let c_candidate = create_sheet_identifier(base_name, n_idx);
            if !self.dict_sheet_owner.contains_key(&c_candidate.to_lowercase()) {
                return c_candidate;
            }
            n_idx += 1;
        }
    }
}

/// Declared title, or `<prefix>_<identifier>_<index>` when absent.
fn derive_report_title(
    report_obj: Option<&Map<String, Value>>,
    source_id: &str,
    idx_report: usize,
    title_prefix: &str,
) -> String {
    match report_obj.and_then(|obj| obj.get("title")) {
        Some(Value::String(c_title)) if !c_title.trim().is_empty() => c_title.clone(),
        Some(value) if !value.is_null() && !value.is_string() => value.to_string(),
        _ => format!(
            "{title_prefix}_{}_{}",
            derive_display_identifier(source_id, ""),
            idx_report + 1
        ),
    }
}

/// The `fields` mapping, or the report object itself when `fields` is absent.
fn derive_report_fields(report_obj: &Map<String, Value>) -> Option<&Map<String, Value>> {
    match report_obj.get("fields") {
        Some(Value::Object(fields)) => Some(fields),
        Some(_) => None,
        None => Some(report_obj),
    }
}

fn collect_report_entries<'a>(
    documents: &'a [SpecSourceDocument],
    options: &SpecLayoutOptions,
    registry: &mut SheetNameRegistry,
    report: &mut SpecLayoutReport,
    sink: &dyn EventSink,
) -> Result<Vec<SpecReportEntry<'a>>, LayoutError> {
    let mut l_entries = Vec::new();
    for doc in documents {
        let l_values: Vec<&Value> = match &doc.value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        for (idx_report, value) in l_values.into_iter().enumerate() {
            let report_obj = value.as_object();
            if report_obj.is_none() {
                report.cnt_degenerate += 1;
                report.warn(format!(
                    "Report #{} in {} is not a mapping; only the identifier is written.",
                    idx_report + 1,
                    doc.source_id
                ));
                sink.emit(LayoutEvent::ReportDegenerate {
                    source_id: doc.source_id.clone(),
                });
            }

            let c_title = derive_report_title(
                report_obj,
                &doc.source_id,
                idx_report,
                &options.default_title_prefix,
            );
            let c_sheet_name =
                registry.resolve(&c_title, options.rule_title_collision, report, sink)?;

            l_entries.push(SpecReportEntry {
                source_id: &doc.source_id,
                sheet_name: c_sheet_name,
                fields: report_obj.and_then(derive_report_fields),
            });
        }
    }
    Ok(l_entries)
}

/// Lay out every report of `documents` into sheets.
pub fn build_workbook_layout(
    documents: &[SpecSourceDocument],
    options: &SpecLayoutOptions,
    sink: &dyn EventSink,
) -> Result<SpecWorkbookLayout, LayoutError> {
    let filters = SpecValueFilters::from_policy(&options.value_policy)?;
    let mut report = SpecLayoutReport {
        cnt_documents: documents.len() as u64,
        ..SpecLayoutReport::default()
    };
    let mut registry = SheetNameRegistry::default();
    let l_entries = collect_report_entries(documents, options, &mut registry, &mut report, sink)?;

    // Pass 1
    let mut accumulator = SchemaAccumulator::new();
    for entry in &l_entries {
        let dict_shapes = entry
            .fields
            .map(|fields| classify_fields(fields, sink))
            .unwrap_or_default();
        accumulator.merge_report(&entry.sheet_name, &dict_shapes);
    }
    let dict_schemas = accumulator.finalize();

    // Pass 2
    let mut dict_sheets: IndexMap<String, SpecSheetGrid> = IndexMap::new();
    for entry in &l_entries {
        if !dict_sheets.contains_key(&entry.sheet_name) {
            let schema = dict_schemas
                .get(&entry.sheet_name)
                .ok_or_else(|| LayoutError::MissingSchema(entry.sheet_name.clone()))?;
            let layout = plan_sheet_layout(&entry.sheet_name, schema, &options.identifier_header);
            sink.emit(LayoutEvent::SheetCreated {
                sheet_name: entry.sheet_name.clone(),
                n_cols: layout.n_cols,
                n_rows_header: layout.n_rows_header,
            });
            report.sheets.push(entry.sheet_name.clone());
            dict_sheets.insert(entry.sheet_name.clone(), SpecSheetGrid::new(layout));
        }
        let Some(sheet) = dict_sheets.get_mut(&entry.sheet_name) else {
            return Err(LayoutError::MissingSchema(entry.sheet_name.clone()));
        };

        let row = render_row(
            &sheet.layout,
            entry.source_id,
            entry.fields,
            &filters,
            &options.filter_text,
        );
        let n_row_idx = sheet.append_row(row);
        report.cnt_reports += 1;
        sink.emit(LayoutEvent::RowRendered {
            sheet_name: entry.sheet_name.clone(),
            row_idx: n_row_idx,
            source_id: entry.source_id.to_string(),
        });
    }

    Ok(SpecWorkbookLayout {
        sheets: dict_sheets.into_values().collect(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::{CollectEventSink, NullEventSink};
    use crate::spec::EnumCellValue;

    fn doc(source_id: &str, value: Value) -> SpecSourceDocument {
        SpecSourceDocument::new(source_id, value)
    }

    fn build(
        documents: &[SpecSourceDocument],
        options: &SpecLayoutOptions,
    ) -> Result<SpecWorkbookLayout, LayoutError> {
        build_workbook_layout(documents, options, &NullEventSink)
    }

    #[test]
    fn test_sheet_columns_cover_widest_report() {
        let documents = vec![
            doc(
                "r1.json",
                json!({"title": "T", "fields": {"List": [1, 2]}}),
            ),
            doc(
                "r2.json",
                json!({"title": "T", "fields": {"List": [1, 2, 3, 4, 5], "Extra": "x"}}),
            ),
        ];
        let workbook = build(&documents, &SpecLayoutOptions::default()).unwrap();

        assert_eq!(workbook.sheets.len(), 1);
        let sheet = &workbook.sheets[0];
        assert_eq!(sheet.layout.n_cols, 7);
        assert_eq!(sheet.rows.len(), 2);
        for row in &sheet.rows {
            assert_eq!(row.len(), 7);
        }
        assert_eq!(sheet.rows[0][1], EnumCellValue::Empty);
        assert_eq!(sheet.rows[0][2], EnumCellValue::Integer(1));
        assert_eq!(sheet.rows[0][4], EnumCellValue::Empty);
        assert_eq!(sheet.rows[1][1], EnumCellValue::String("x".to_string()));
    }

    #[test]
    fn test_rows_keep_encounter_order_across_sheets() {
        let documents = vec![
            doc(
                "multi.json",
                json!([
                    {"title": "A", "fields": {"v": 1}},
                    {"title": "B", "fields": {"v": 2}},
                    {"title": "A", "fields": {"v": 3}},
                ]),
            ),
        ];
        let sink = CollectEventSink::new();
        let workbook =
            build_workbook_layout(&documents, &SpecLayoutOptions::default(), &sink).unwrap();

        assert_eq!(workbook.report.sheets, vec!["A", "B"]);
        assert_eq!(workbook.sheets[0].rows[0][1], EnumCellValue::Integer(1));
        assert_eq!(workbook.sheets[0].rows[1][1], EnumCellValue::Integer(3));
        assert_eq!(workbook.report.cnt_reports, 3);

        let l_rows: Vec<usize> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                LayoutEvent::RowRendered { sheet_name, row_idx, .. } if sheet_name == "A" => {
                    Some(row_idx)
                }
                _ => None,
            })
            .collect();
        assert_eq!(l_rows, vec![1, 2]);
    }

    #[test]
    fn test_untitled_and_fieldless_reports() {
        let documents = vec![
            doc("plain.json", json!({"Voltage": "12.5"})),
            doc("degenerate.json", json!(42)),
        ];
        let workbook = build(&documents, &SpecLayoutOptions::default()).unwrap();

        assert_eq!(workbook.report.sheets, vec!["Report_plain_1", "Report_degenerate_1"]);
        assert_eq!(workbook.sheets[0].rows[0][1], EnumCellValue::Float(12.5));
        assert_eq!(
            workbook.sheets[1].rows[0],
            vec![EnumCellValue::String("degenerate".to_string())]
        );
        assert_eq!(workbook.report.cnt_degenerate, 1);
    }

    #[test]
    fn test_empty_fields_still_consume_a_row() {
        let documents = vec![
            doc("a.json", json!({"title": "T", "fields": {"x": 1}})),
            doc("b.json", json!({"title": "T", "fields": {}})),
        ];
        let workbook = build(&documents, &SpecLayoutOptions::default()).unwrap();
        assert_eq!(
            workbook.sheets[0].rows[1],
            vec![EnumCellValue::String("b".to_string()), EnumCellValue::Empty]
        );
    }

    fn colliding_documents() -> Vec<SpecSourceDocument> {
        let c_base = "Measurement Report Number Alpha";
        vec![
            doc("a.json", json!({"title": format!("{c_base} 1"), "fields": {"x": 1}})),
            doc("b.json", json!({"title": format!("{c_base} 2"), "fields": {"y": 2}})),
        ]
    }

    #[test]
    fn test_title_collision_merge_warns() {
        let sink = CollectEventSink::new();
        let workbook =
            build_workbook_layout(&colliding_documents(), &SpecLayoutOptions::default(), &sink)
                .unwrap();

        assert_eq!(workbook.sheets.len(), 1);
        assert_eq!(workbook.sheets[0].layout.n_cols, 3);
        assert_eq!(workbook.report.warnings.len(), 1);
        assert!(
            sink.events()
                .iter()
                .any(|e| matches!(e, LayoutEvent::TitleCollision { .. }))
        );
    }

    #[test]
    fn test_title_collision_suffix_and_error() {
        let options = SpecLayoutOptions {
            rule_title_collision: EnumTitleCollisionPolicy::Suffix,
            ..SpecLayoutOptions::default()
        };
        let workbook = build(&colliding_documents(), &options).unwrap();
        assert_eq!(
            workbook.report.sheets,
            vec![
                "Measurement Report Number Alpha",
                "Measurement Report Number Alp_2"
            ]
        );

        let options = SpecLayoutOptions {
            rule_title_collision: EnumTitleCollisionPolicy::Error,
            ..SpecLayoutOptions::default()
        };
        assert!(matches!(
            build(&colliding_documents(), &options),
            Err(LayoutError::TitleCollision { .. })
        ));
    }
}
