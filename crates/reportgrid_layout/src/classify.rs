//! Per-value shape classification.
//!
//! A field value is classified exactly once into an [`EnumFieldShape`];
//! every downstream component dispatches on that tag instead of re-inspecting
//! the JSON value.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::event::{EventSink, LayoutEvent};
use crate::schema::{merge_dimensions_max, sort_nested_paths};
use crate::spec::{
    EnumFieldShape, SpecKeyValueShape, SpecListShape, SpecNestedPath, SpecNestedPaths,
};

/// Outcome of classifying one value, including whether a key-value
/// candidate was downgraded.
struct SpecClassifyOutcome {
    shape: EnumFieldShape,
    n_items_downgraded: Option<usize>,
}

/// Classify one field value.
pub fn classify_value(value: &Value) -> EnumFieldShape {
    derive_shape(value).shape
}

/// Classify one named field value, emitting events to `sink`.
pub fn classify_field(name: &str, value: &Value, sink: &dyn EventSink) -> EnumFieldShape {
    let outcome = derive_shape(value);
    if let Some(n_items) = outcome.n_items_downgraded {
        sink.emit(LayoutEvent::KeyValueDowngraded {
            field: name.to_string(),
            n_items,
        });
    }
    sink.emit(LayoutEvent::FieldClassified {
        field: name.to_string(),
        kind: outcome.shape.kind(),
        width: outcome.shape.width(),
    });
    outcome.shape
}

/// Classify every field of one report, in field-name order.
pub fn classify_fields(
    fields: &Map<String, Value>,
    sink: &dyn EventSink,
) -> BTreeMap<String, EnumFieldShape> {
    fields
        .iter()
        .map(|(c_name, value)| (c_name.clone(), classify_field(c_name, value, sink)))
        .collect()
}

fn derive_shape(value: &Value) -> SpecClassifyOutcome {
    let Value::Array(items) = value else {
        return SpecClassifyOutcome {
            shape: EnumFieldShape::Scalar,
            n_items_downgraded: None,
        };
    };

    let l_objects: Option<Vec<&Map<String, Value>>> =
        items.iter().map(Value::as_object).collect();
    if let Some(l_objects) = l_objects
        && !l_objects.is_empty()
    {
        if let Some(shape) = derive_key_value_shape(&l_objects) {
            return SpecClassifyOutcome {
                shape: EnumFieldShape::KeyValueList(shape),
                n_items_downgraded: None,
            };
        }
        return SpecClassifyOutcome {
            shape: EnumFieldShape::List(SpecListShape {
                dimensions: vec![l_objects.len()],
            }),
            n_items_downgraded: Some(l_objects.len()),
        };
    }

    SpecClassifyOutcome {
        shape: EnumFieldShape::List(SpecListShape {
            dimensions: derive_list_dimensions(items),
        }),
        n_items_downgraded: None,
    }
}

/// Level sizes of a (possibly ragged) nested list; sibling sub-lists are
/// merged by elementwise maximum.
fn derive_list_dimensions(items: &[Value]) -> Vec<usize> {
    let mut l_dims_child: Option<Vec<usize>> = None;
    for item in items {
        let Value::Array(sub_items) = item else {
            continue;
        };
        let l_dims_item = derive_list_dimensions(sub_items);
        l_dims_child = Some(match l_dims_child {
            Some(l_dims) => merge_dimensions_max(&l_dims, &l_dims_item),
            None => l_dims_item,
        });
    }

    let mut l_dims = vec![items.len()];
    if let Some(l_dims_child) = l_dims_child {
        l_dims.extend(l_dims_child);
    }
    l_dims
}

/// Key-value shape if every item carries the first item's key set.
fn derive_key_value_shape(items: &[&Map<String, Value>]) -> Option<SpecKeyValueShape> {
    let (item_first, items_rest) = items.split_first()?;
    let if_consistent = items_rest.iter().all(|item| {
        item.len() == item_first.len() && item.keys().all(|key| item_first.contains_key(key))
    });
    if !if_consistent {
        return None;
    }

    let mut unique_keys: Vec<String> = item_first.keys().cloned().collect();
    unique_keys.sort();

    let mut nested_structure = BTreeMap::new();
    for (c_key, value) in item_first.iter() {
        let Some(obj) = derive_representative_object(value) else {
            continue;
        };
        let mut l_paths = Vec::new();
        let mut l_segments = vec![c_key.clone()];
        collect_nested_paths(obj, &mut l_segments, &mut l_paths);
        sort_nested_paths(&mut l_paths);
        if !l_paths.is_empty() {
            nested_structure.insert(c_key.clone(), SpecNestedPaths { paths: l_paths });
        }
    }

    Some(SpecKeyValueShape {
        unique_keys,
        nested_structure,
    })
}

/// Mapping value, or the first item of a list of mappings.
pub(crate) fn derive_representative_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(obj) => Some(obj),
        Value::Array(items) => items.first().and_then(Value::as_object),
        _ => None,
    }
}

/// Depth-first flattening in key encounter order; empty mappings are leaves.
fn collect_nested_paths(
    obj: &Map<String, Value>,
    segments: &mut Vec<String>,
    paths: &mut Vec<SpecNestedPath>,
) {
    for (c_key, value) in obj {
        segments.push(c_key.clone());
        match value {
            Value::Object(sub_obj) if !sub_obj.is_empty() => {
                collect_nested_paths(sub_obj, segments, paths)
            }
            _ => paths.push(SpecNestedPath::from_segments(segments.clone())),
        }
        segments.pop();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::CollectEventSink;
    use crate::spec::EnumShapeKind;

    fn dims(shape: &EnumFieldShape) -> Vec<usize> {
        shape.dimensions().to_vec()
    }

    #[test]
    fn test_scalars_classify_as_scalar() {
        for value in [json!("x"), json!(1.5), json!(null), json!({"a": 1})] {
            assert_eq!(classify_value(&value), EnumFieldShape::Scalar);
        }
    }

    #[test]
    fn test_flat_and_ragged_lists() {
        assert_eq!(dims(&classify_value(&json!(["a", "b", "c"]))), vec![3]);
        assert_eq!(dims(&classify_value(&json!([]))), vec![0]);
        assert_eq!(
            dims(&classify_value(&json!([[1, 2], [3, 4, 5], []]))),
            vec![3, 3]
        );
        assert_eq!(
            dims(&classify_value(&json!([[[1], [2, 3]], [[4]]]))),
            vec![2, 2, 2]
        );
    }

    #[test]
    fn test_key_value_list_sorts_keys_and_registers_nested_paths() {
        let value = json!([{"z": 1, "b": {"y": 20, "x": {"deep": 1}}, "a": 2}]);
        let EnumFieldShape::KeyValueList(kv) = classify_value(&value) else {
            panic!("expected key-value list");
        };

        assert_eq!(kv.unique_keys, vec!["a", "b", "z"]);
        let l_paths: Vec<&str> = kv.nested_structure["b"]
            .paths
            .iter()
            .map(|p| p.path.as_str())
            .collect();
        assert_eq!(l_paths, vec!["b.x.deep", "b.y"]);
        assert_eq!(kv.nested_structure["b"].paths[0].leaf(), "deep");
        assert_eq!(kv.width(), 4);
    }

    #[test]
    fn test_nested_key_uses_first_item_of_list_of_mappings() {
        let value = json!([{"a": [{"p": 1, "q": 2}]}]);
        let shape = classify_value(&value);
        assert_eq!(shape.kind(), EnumShapeKind::NestedKeyValueList);
        assert_eq!(shape.width(), 2);
    }

    #[test]
    fn test_inconsistent_keys_downgrade_with_event() {
        let sink = CollectEventSink::new();
        let value = json!([{"a": 1}, {"b": 2}, {"a": 3}]);
        let shape = classify_field("Mixed", &value, &sink);

        assert_eq!(dims(&shape), vec![3]);
        assert_eq!(
            sink.events()[0],
            LayoutEvent::KeyValueDowngraded {
                field: "Mixed".to_string(),
                n_items: 3,
            }
        );
    }

    #[test]
    fn test_classify_fields_returns_sorted_map() {
        let fields = json!({"b": 1, "a": [1, 2]});
        let Value::Object(fields) = fields else {
            unreachable!()
        };
        let dict_shapes = classify_fields(&fields, &crate::event::NullEventSink);
        let l_names: Vec<&String> = dict_shapes.keys().collect();
        assert_eq!(l_names, vec!["a", "b"]);
    }
}
