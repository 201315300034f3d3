//! Per-sheet schema accumulation.
//!
//! Merging does not depend on report order or grouping. Dimensions merge by
//! elementwise maximum, key sets and nested paths by sorted union, and shape
//! kinds by a fixed precedence (`Scalar < List < KeyValueList`).

use std::collections::{BTreeMap, BTreeSet};

use crate::spec::{
    EnumFieldShape, SpecKeyValueShape, SpecListShape, SpecNestedPath, SpecNestedPaths,
    SpecSheetSchema,
};

////////////////////////////////////////////////////////////////////////////////
// #region MergeRules

/// Elementwise maximum; a level missing on one side counts as padding of 1.
pub fn merge_dimensions_max(left: &[usize], right: &[usize]) -> Vec<usize> {
    let n_len = usize::max(left.len(), right.len());
    (0..n_len)
        .map(|n_idx| match (left.get(n_idx), right.get(n_idx)) {
            (Some(n_left), Some(n_right)) => usize::max(*n_left, *n_right),
            (Some(n_dim), None) | (None, Some(n_dim)) => usize::max(*n_dim, 1),
            (None, None) => 1,
        })
        .collect()
}

/// Merge two path registries of one key.
///
/// Union of both sides in canonical segment order.
pub fn merge_nested_paths(left: &SpecNestedPaths, right: &SpecNestedPaths) -> SpecNestedPaths {
    if left == right {
        return left.clone();
    }

    let mut l_paths: Vec<SpecNestedPath> = left
        .paths
        .iter()
        .chain(right.paths.iter())
        .cloned()
        .collect();
    sort_nested_paths(&mut l_paths);
    SpecNestedPaths { paths: l_paths }
}

/// Canonical path order: lexicographic by segments, duplicates removed.
///
/// Segment order keeps every sub-mapping's paths contiguous.
pub fn sort_nested_paths(paths: &mut Vec<SpecNestedPath>) {
    paths.sort_by(|a, b| a.segments.cmp(&b.segments));
    paths.dedup_by(|a, b| a.segments == b.segments);
}

fn merge_key_value_shapes(left: &SpecKeyValueShape, right: &SpecKeyValueShape) -> SpecKeyValueShape {
    let unique_keys: Vec<String> = left
        .unique_keys
        .iter()
        .chain(right.unique_keys.iter())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut nested_structure = left.nested_structure.clone();
    for (c_key, paths_right) in &right.nested_structure {
        let paths_merged = match nested_structure.get(c_key) {
            Some(paths_left) => merge_nested_paths(paths_left, paths_right),
            None => paths_right.clone(),
        };
        nested_structure.insert(c_key.clone(), paths_merged);
    }

    SpecKeyValueShape {
        unique_keys,
        nested_structure,
    }
}

/// Merge two shapes of the same field.
pub fn merge_field_shapes(left: &EnumFieldShape, right: &EnumFieldShape) -> EnumFieldShape {
    match (left, right) {
        (EnumFieldShape::KeyValueList(kv_left), EnumFieldShape::KeyValueList(kv_right)) => {
            EnumFieldShape::KeyValueList(merge_key_value_shapes(kv_left, kv_right))
        }
        (EnumFieldShape::KeyValueList(_), _) => left.clone(),
        (_, EnumFieldShape::KeyValueList(_)) => right.clone(),
        (EnumFieldShape::List(list_left), EnumFieldShape::List(list_right)) => {
            EnumFieldShape::List(SpecListShape {
                dimensions: merge_dimensions_max(&list_left.dimensions, &list_right.dimensions),
            })
        }
        (EnumFieldShape::List(_), EnumFieldShape::Scalar) => left.clone(),
        (EnumFieldShape::Scalar, _) => right.clone(),
    }
}

/// Merge one report's field shapes into an (optional) existing schema.
pub fn merge_schema(
    existing: Option<SpecSheetSchema>,
    incoming: &BTreeMap<String, EnumFieldShape>,
) -> SpecSheetSchema {
    let mut schema = existing.unwrap_or_default();
    for (c_name, shape) in incoming {
        let shape_merged = match schema.fields.get(c_name) {
            Some(shape_existing) => merge_field_shapes(shape_existing, shape),
            None => shape.clone(),
        };
        schema.fields.insert(c_name.clone(), shape_merged);
    }
    schema.needs_subtitles = schema.fields.values().any(EnumFieldShape::needs_subtitles);
    schema
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Accumulator

/// Schema table keyed by sheet name, mutated during the analysis pass only.
#[derive(Debug, Clone, Default)]
pub struct SchemaAccumulator {
    dict_schemas: BTreeMap<String, SpecSheetSchema>,
    cnt_reports: u64,
}

impl SchemaAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one report's shapes into the schema of `sheet_name`.
    ///
    /// A report with no fields still registers its sheet.
    pub fn merge_report(&mut self, sheet_name: &str, shapes: &BTreeMap<String, EnumFieldShape>) {
        let existing = self.dict_schemas.remove(sheet_name);
        let schema = merge_schema(existing, shapes);
        self.dict_schemas.insert(sheet_name.to_string(), schema);
        self.cnt_reports += 1;
    }

    /// Number of merged reports.
    pub fn cnt_reports(&self) -> u64 {
        self.cnt_reports
    }

    /// Freeze the table; schemas are read-only from here on.
    pub fn finalize(self) -> BTreeMap<String, SpecSheetSchema> {
        self.dict_schemas
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
