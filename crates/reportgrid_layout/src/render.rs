//! Row rendering: one report's fields against a frozen sheet layout.

use serde_json::{Map, Value};

use crate::classify::derive_representative_object;
use crate::spec::{EnumCellValue, EnumFieldShape, SpecFieldColumns, SpecKeyValueShape, SpecSheetLayout};
use crate::util::derive_display_identifier;
use crate::value::SpecValueFilters;

/// Render one report into exactly `layout.n_cols` typed cells.
///
/// Missing fields render as blanks; extra values beyond the frozen
/// dimensions are dropped.
pub fn render_row(
    layout: &SpecSheetLayout,
    source_id: &str,
    fields: Option<&Map<String, Value>>,
    filters: &SpecValueFilters,
    filter_text: &str,
) -> Vec<EnumCellValue> {
    let mut l_cells = Vec::with_capacity(layout.n_cols);

    let c_identifier = derive_display_identifier(source_id, filter_text);
    l_cells.push(if c_identifier.is_empty() {
        EnumCellValue::Empty
    } else {
        EnumCellValue::String(c_identifier)
    });

    for column in &layout.columns {
        let value = fields.and_then(|dict_fields| dict_fields.get(&column.name));
        render_field(column, value, filters, &mut l_cells);
    }

    debug_assert_eq!(l_cells.len(), layout.n_cols);
    l_cells
}

fn render_field(
    column: &SpecFieldColumns,
    value: Option<&Value>,
    filters: &SpecValueFilters,
    l_cells: &mut Vec<EnumCellValue>,
) {
    match &column.shape {
        EnumFieldShape::Scalar => {
            l_cells.push(filters.derive_cell_value(derive_first_of_list(value), &column.name));
        }
        EnumFieldShape::List(list) => {
            let mut l_leaves = Vec::with_capacity(column.width);
            flatten_against_dimensions(value, &list.dimensions, &mut l_leaves);
            l_cells.extend(
                l_leaves
                    .into_iter()
                    .map(|leaf| filters.derive_cell_value(leaf, &column.name)),
            );
        }
        EnumFieldShape::KeyValueList(kv) => {
            render_key_value(&column.name, kv, value, filters, l_cells);
        }
    }
}

/// The value itself, or its first element if it is a list.
fn derive_first_of_list(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(Value::Array(items)) => items.first(),
        other => other,
    }
}

/// Row-major flattening that always yields the product of the floored
/// dimensions; short levels are right-padded with `None`.
pub fn flatten_against_dimensions<'a>(
    value: Option<&'a Value>,
    dimensions: &[usize],
    l_leaves: &mut Vec<Option<&'a Value>>,
) {
    let Some((n_dim, dims_rest)) = dimensions.split_first() else {
        l_leaves.push(derive_first_of_list(value));
        return;
    };

    let n_slots = usize::max(1, *n_dim);
    match value {
        Some(Value::Array(items)) => {
            for n_idx in 0..n_slots {
                flatten_against_dimensions(items.get(n_idx), dims_rest, l_leaves);
            }
        }
        Some(other) => {
            flatten_against_dimensions(Some(other), dims_rest, l_leaves);
            for _ in 1..n_slots {
                flatten_against_dimensions(None, dims_rest, l_leaves);
            }
        }
        None => {
            for _ in 0..n_slots {
                flatten_against_dimensions(None, dims_rest, l_leaves);
            }
        }
    }
}

/// Only the first item is rendered; every reserved column is written.
fn render_key_value(
    field_name: &str,
    kv: &SpecKeyValueShape,
    value: Option<&Value>,
    filters: &SpecValueFilters,
    l_cells: &mut Vec<EnumCellValue>,
) {
    if kv.unique_keys.is_empty() {
        l_cells.push(EnumCellValue::Empty);
        return;
    }

    let item = value.and_then(derive_representative_object);
    for c_key in &kv.unique_keys {
        let l_paths = kv
            .nested_structure
            .get(c_key)
            .map(|nested| nested.paths.as_slice())
            .unwrap_or_default();

        if l_paths.is_empty() {
            let leaf = derive_first_of_list(item.and_then(|obj| obj.get(c_key)));
            l_cells.push(filters.derive_cell_value(leaf, &format!("{field_name} {c_key}")));
            continue;
        }

        for path in l_paths {
            let leaf = derive_first_of_list(lookup_path(item, &path.segments));
            l_cells.push(filters.derive_cell_value(leaf, &format!("{field_name} {}", path.path)));
        }
    }
}

/// Walk `segments` from `item`, stepping into the first element of lists.
fn lookup_path<'a>(item: Option<&'a Map<String, Value>>, segments: &[String]) -> Option<&'a Value> {
    let (c_first, segments_rest) = segments.split_first()?;
    let mut current = item?.get(c_first)?;
    for c_segment in segments_rest {
        current = derive_representative_object(current)?.get(c_segment)?;
    }
    Some(current)
}
