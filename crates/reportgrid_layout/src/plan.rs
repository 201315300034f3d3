//! Column planning: field column ranges, header row and subtitle rows.

use crate::spec::{
    EnumFieldShape, SpecFieldColumns, SpecKeyValueShape, SpecSheetHorizontalMerge,
    SpecSheetLayout, SpecSheetSchema,
};

/// Mutable header block while planning one sheet.
struct SpecHeaderCanvas {
    header_grid: Vec<Vec<String>>,
    merges: Vec<SpecSheetHorizontalMerge>,
    n_rows_subtitle: usize,
}

impl SpecHeaderCanvas {
    fn new(n_rows_header: usize, n_cols: usize) -> Self {
        Self {
            header_grid: vec![vec![String::new(); n_cols]; n_rows_header],
            merges: Vec::new(),
            n_rows_subtitle: n_rows_header.saturating_sub(1),
        }
    }

    /// Write `text` at the anchor cell; register a merge when `n_span > 1`.
    fn write_span(&mut self, row_idx: usize, col_idx_start: usize, n_span: usize, text: &str) {
        self.header_grid[row_idx][col_idx_start] = text.to_string();
        if n_span > 1 {
            self.merges.push(SpecSheetHorizontalMerge {
                row_idx,
                col_idx_start,
                col_idx_end: col_idx_start + n_span - 1,
                text: text.to_string(),
            });
        }
    }
}

/// Plan the frozen column layout and header block of one sheet.
///
/// Column 0 carries the identifier; fields follow in lexicographic order.
pub fn plan_sheet_layout(
    sheet_name: &str,
    schema: &SpecSheetSchema,
    identifier_header: &str,
) -> SpecSheetLayout {
    let n_cols = schema.column_count();
    let n_rows_header = 1 + schema.subtitle_rows();
    let mut canvas = SpecHeaderCanvas::new(n_rows_header, n_cols);
    canvas.write_span(0, 0, 1, identifier_header);

    let mut l_columns = Vec::with_capacity(schema.fields.len());
    let mut n_col_cursor = 1;
    for (c_name, shape) in &schema.fields {
        let n_width = shape.width();
        canvas.write_span(0, n_col_cursor, n_width, c_name);

        match shape {
            EnumFieldShape::Scalar => {}
            EnumFieldShape::List(list) => {
                if n_width > 1 {
                    plan_list_subtitles(
                        &mut canvas,
                        c_name,
                        &list.dimensions,
                        0,
                        n_col_cursor,
                        n_width,
                    );
                }
            }
            EnumFieldShape::KeyValueList(kv) => {
                plan_key_value_subtitles(&mut canvas, kv, n_col_cursor);
            }
        }

        l_columns.push(SpecFieldColumns {
            name: c_name.clone(),
            col_idx_start: n_col_cursor,
            width: n_width,
            shape: shape.clone(),
        });
        n_col_cursor += n_width;
    }

    SpecSheetLayout {
        sheet_name: sheet_name.to_string(),
        columns: l_columns,
        header_grid: canvas.header_grid,
        merges: canvas.merges,
        n_cols,
        n_rows_header,
    }
}

/// Subdivide `n_span` columns evenly at each nesting level, labeling
/// sub-spans `"<prefix> - #<i>"` on subtitle row `level + 1`.
fn plan_list_subtitles(
    canvas: &mut SpecHeaderCanvas,
    prefix: &str,
    dimensions: &[usize],
    level: usize,
    col_idx_start: usize,
    n_span: usize,
) {
    if level >= dimensions.len() || level + 1 > canvas.n_rows_subtitle {
        return;
    }

    let n_parts = usize::max(1, dimensions[level]);
    let n_span_sub = n_span / n_parts;
    if n_span_sub == 0 {
        return;
    }

    for n_idx in 0..n_parts {
        let c_label = format!("{prefix} - #{}", n_idx + 1);
        let n_col_sub = col_idx_start + n_idx * n_span_sub;
        canvas.write_span(level + 1, n_col_sub, n_span_sub, &c_label);
        plan_list_subtitles(canvas, &c_label, dimensions, level + 1, n_col_sub, n_span_sub);
    }
}

/// One subtitle per key on row 1; nested keys span their paths with leaf
/// names on row 2.
fn plan_key_value_subtitles(
    canvas: &mut SpecHeaderCanvas,
    kv: &SpecKeyValueShape,
    col_idx_start: usize,
) {
    let mut n_col_cursor = col_idx_start;
    for c_key in &kv.unique_keys {
        let n_width = kv.width_of_key(c_key);
        canvas.write_span(1, n_col_cursor, n_width, c_key);

        if let Some(nested) = kv.nested_structure.get(c_key) {
            for (n_offset, path) in nested.paths.iter().enumerate() {
                canvas.write_span(2, n_col_cursor + n_offset, 1, path.leaf());
            }
        }
        n_col_cursor += n_width;
    }
}
