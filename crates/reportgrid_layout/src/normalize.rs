//! Upstream field normalization applied before shape analysis.
//!
//! Transforms, in order:
//! 1. continuation merge (`"<name> (+1)"` folded into `<name>`)
//! 2. overshoot split (`"3.5 2.1"` -> `["2.1", "3.5"]`)
//! 3. single-item list flattening inside key-value items
//! 4. mapping fields wrapped into one-item key-value lists
//! 5. number pair split (`"1.2 & 3.4"` -> `["1.2", "3.4"]`)

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::conf::{C_CONTINUATION_MARKER, C_CONTINUATION_SEPARATOR, C_DATE_FIELD_MARKER};
use crate::spec::{LayoutError, SpecSourceDocument};

////////////////////////////////////////////////////////////////////////////////
// #region Options

/// How preserve-duplicates entries match field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumPreserveMatchRule {
    /// Field name equals the entry.
    Exact,
    /// Field name starts with the entry.
    #[default]
    Prefix,
}

/// Normalization options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecNormalizeOptions {
    /// Fields whose continuation values are kept as lists, never de-duplicated.
    pub preserve_duplicates_prefixes: Vec<String>,
    /// Match rule for `preserve_duplicates_prefixes`.
    pub rule_preserve_match: EnumPreserveMatchRule,
    /// Fold continuation fields into their base field.
    pub if_merge_continuations: bool,
    /// Split two-token overshoot values into `[min, max]`.
    pub if_split_overshoot: bool,
    /// Split `a & b` / `a / b` number pairs into two-element lists.
    pub if_split_number_pairs: bool,
    /// Replace one-element lists of a mapping inside key-value items.
    pub if_flatten_single_item_lists: bool,
    /// Wrap mapping-valued fields into one-item lists.
    pub if_wrap_dict_fields: bool,
    /// Fields containing this marker (case-insensitive) are never pair-split.
    pub date_field_marker: String,
}

impl Default for SpecNormalizeOptions {
    fn default() -> Self {
        Self {
            preserve_duplicates_prefixes: Vec::new(),
            rule_preserve_match: EnumPreserveMatchRule::Prefix,
            if_merge_continuations: true,
            if_split_overshoot: true,
            if_split_number_pairs: true,
            if_flatten_single_item_lists: true,
            if_wrap_dict_fields: true,
            date_field_marker: C_DATE_FIELD_MARKER.to_string(),
        }
    }
}

impl SpecNormalizeOptions {
    /// Whether `field_name` keeps duplicate continuation values.
    pub fn is_preserve_duplicates(&self, field_name: &str) -> bool {
        self.preserve_duplicates_prefixes
            .iter()
            .any(|c_entry| match self.rule_preserve_match {
                EnumPreserveMatchRule::Exact => field_name == c_entry,
                EnumPreserveMatchRule::Prefix => field_name.starts_with(c_entry.as_str()),
            })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Entry

/// Compiled patterns shared by every report.
struct SpecNormalizePatterns {
    re_unit_key: Regex,
    re_number_pair: Regex,
}

impl SpecNormalizePatterns {
    fn new() -> Result<Self, LayoutError> {
        Ok(Self {
            re_unit_key: compile_pattern(r"\[([^\]]+)\]")?,
            re_number_pair: compile_pattern(
                r"^\s*(-?\d+(?:[.,]\d+)?)\s*[&/]\s*(-?\d+(?:[.,]\d+)?)\s*$",
            )?,
        })
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, LayoutError> {
    Regex::new(pattern).map_err(|e| LayoutError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Normalize every report of every document in place.
pub fn normalize_documents(
    documents: &mut [SpecSourceDocument],
    options: &SpecNormalizeOptions,
) -> Result<(), LayoutError> {
    let patterns = SpecNormalizePatterns::new()?;
    for doc in documents.iter_mut() {
        match &mut doc.value {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(report) = item {
                        normalize_report(report, options, &patterns);
                    }
                }
            }
            Value::Object(report) => normalize_report(report, options, &patterns),
            _ => {}
        }
        log::debug!("normalized {}", doc.source_id);
    }
    Ok(())
}

/// The `fields` mapping, or the report itself when `fields` is absent.
fn derive_fields_mut(report: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    if report.contains_key("fields") {
        report.get_mut("fields").and_then(Value::as_object_mut)
    } else {
        Some(report)
    }
}

fn normalize_report(
    report: &mut Map<String, Value>,
    options: &SpecNormalizeOptions,
    patterns: &SpecNormalizePatterns,
) {
    let Some(fields) = derive_fields_mut(report) else {
        return;
    };

    if options.if_merge_continuations {
        let merged = merge_continuation_fields(fields, options, &patterns.re_unit_key);
        *fields = merged;
    }
    if options.if_split_overshoot {
        split_overshoot_values(fields);
    }
    if options.if_flatten_single_item_lists {
        flatten_single_item_lists(fields);
    }
    if options.if_wrap_dict_fields {
        wrap_dict_fields(fields);
    }
    if options.if_split_number_pairs {
        split_number_pairs(fields, &options.date_field_marker, &patterns.re_number_pair);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ContinuationMerge

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(is_empty_value),
        other => is_empty_value(other),
    }
}

/// Drop empty values; filtered lists of one collapse to their item.
pub fn clean_empty_keys(data: &Map<String, Value>) -> Map<String, Value> {
    let mut dict_cleaned = Map::new();
    for (c_key, value) in data {
        match value {
            Value::Array(items) => {
                let mut l_kept: Vec<Value> =
                    items.iter().filter(|v| !is_empty_value(v)).cloned().collect();
                match l_kept.len() {
                    0 => {}
                    1 => {
                        dict_cleaned.insert(c_key.clone(), l_kept.remove(0));
                    }
                    _ => {
                        dict_cleaned.insert(c_key.clone(), Value::Array(l_kept));
                    }
                }
            }
            other if is_empty_value(other) => {}
            other => {
                dict_cleaned.insert(c_key.clone(), other.clone());
            }
        }
    }
    dict_cleaned
}

/// Merge one continuation value into an existing base value.
fn merge_into_base(base: &mut Value, value: &Value, if_preserve: bool) {
    if if_preserve {
        let mut l_values = match base.take() {
            Value::Array(items) => items,
            other => vec![other],
        };
        match value {
            Value::Array(items) => l_values.extend(items.iter().cloned()),
            other => l_values.push(other.clone()),
        }
        *base = Value::Array(l_values);
        return;
    }

    match (&mut *base, value) {
        (Value::Array(l_base), Value::Array(items)) => {
            for item in items {
                if !is_empty_value(item) && !l_base.contains(item) {
                    l_base.push(item.clone());
                }
            }
        }
        (Value::Array(l_base), other) => {
            if !l_base.contains(other) {
                l_base.push(other.clone());
            }
        }
        (base_scalar, Value::Array(items)) => {
            let base_value = base_scalar.clone();
            let l_new: Vec<Value> = items
                .iter()
                .filter(|v| !is_empty_value(v) && **v != base_value)
                .cloned()
                .collect();
            if !l_new.is_empty() {
                let mut l_values = vec![base_value];
                l_values.extend(l_new);
                *base_scalar = Value::Array(l_values);
            }
        }
        (base_scalar, other) => {
            if *base_scalar != *other {
                let base_value = base_scalar.clone();
                *base_scalar = Value::Array(vec![base_value, other.clone()]);
            }
        }
    }
}

/// Merge continuation `parsed_data` into the base's, key by key.
fn merge_parsed_data(
    merged: &mut Map<String, Value>,
    ext: &Map<String, Value>,
    if_preserve_field: bool,
    re_unit_key: &Regex,
) {
    for (c_key, value) in ext {
        if is_blank_value(value) {
            continue;
        }
        let if_preserve = if_preserve_field || re_unit_key.is_match(c_key);

        if let Some(base) = merged.get_mut(c_key) {
            merge_into_base(base, value, if_preserve);
            continue;
        }

        match value {
            Value::Array(items) => {
                let mut l_kept: Vec<Value> =
                    items.iter().filter(|v| !is_empty_value(v)).cloned().collect();
                let value_new = if l_kept.len() == 1 {
                    l_kept.remove(0)
                } else {
                    Value::Array(l_kept)
                };
                merged.insert(c_key.clone(), value_new);
            }
            other => {
                merged.insert(c_key.clone(), other.clone());
            }
        }
    }
}

fn derive_text(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Base triple with every continuation folded in, if both sides are triples.
fn merge_triples(
    base: &Value,
    l_extensions: &[&Value],
    if_preserve_field: bool,
    re_unit_key: &Regex,
) -> Option<Value> {
    let base_obj = base.as_object()?;
    let mut dict_parsed = base_obj.get("parsed_data")?.as_object()?.clone();
    let mut c_raw_text = derive_text(base_obj, "raw_text");
    let mut c_formatted_text = derive_text(base_obj, "formatted_text");

    for ext in l_extensions {
        let ext_obj = ext.as_object()?;
        let ext_parsed = ext_obj.get("parsed_data")?.as_object()?;
        c_raw_text.push_str(C_CONTINUATION_SEPARATOR);
        c_raw_text.push_str(&derive_text(ext_obj, "raw_text"));
        c_formatted_text.push_str(C_CONTINUATION_SEPARATOR);
        c_formatted_text.push_str(&derive_text(ext_obj, "formatted_text"));
        merge_parsed_data(&mut dict_parsed, ext_parsed, if_preserve_field, re_unit_key);
    }

    let mut merged = Map::new();
    merged.insert("raw_text".to_string(), Value::String(c_raw_text));
    merged.insert("formatted_text".to_string(), Value::String(c_formatted_text));
    merged.insert(
        "parsed_data".to_string(),
        Value::Object(clean_empty_keys(&dict_parsed)),
    );
    Some(Value::Object(merged))
}

/// Fold `"<name> (+1)"` fields into `<name>`.
///
/// Continuations without a base field, or whose values are not
/// `raw_text`/`formatted_text`/`parsed_data` triples, are kept as-is.
pub fn merge_continuation_fields(
    fields: &Map<String, Value>,
    options: &SpecNormalizeOptions,
    re_unit_key: &Regex,
) -> Map<String, Value> {
    let mut dict_merged = Map::new();
    let mut dict_candidates: Map<String, Value> = Map::new();
    let mut l_candidate_order: Vec<(String, Vec<String>)> = Vec::new();

    for (c_name, value) in fields {
        if !c_name.contains(C_CONTINUATION_MARKER) {
            dict_merged.insert(c_name.clone(), value.clone());
            continue;
        }
        let c_base = c_name.replace(C_CONTINUATION_MARKER, "").trim().to_string();
        if !fields.contains_key(&c_base) {
            dict_merged.insert(c_name.clone(), value.clone());
            continue;
        }
        dict_candidates.insert(c_name.clone(), value.clone());
        match l_candidate_order.iter_mut().find(|(c_b, _)| *c_b == c_base) {
            Some((_, l_ext)) => l_ext.push(c_name.clone()),
            None => l_candidate_order.push((c_base, vec![c_name.clone()])),
        }
    }

    for (c_base, l_ext_names) in &l_candidate_order {
        let Some(base) = fields.get(c_base) else {
            continue;
        };
        let l_extensions: Vec<&Value> = l_ext_names
            .iter()
            .filter_map(|c_name| dict_candidates.get(c_name))
            .collect();
        let if_preserve_field = options.is_preserve_duplicates(c_base);

        match merge_triples(base, &l_extensions, if_preserve_field, re_unit_key) {
            Some(merged) => {
                dict_merged.insert(c_base.clone(), merged);
            }
            None => {
                log::warn!("continuation of {c_base:?} is not a text triple, kept unmerged");
                for c_name in l_ext_names {
                    if let Some(value) = dict_candidates.get(c_name) {
                        dict_merged.insert(c_name.clone(), value.clone());
                    }
                }
            }
        }
    }
    dict_merged
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ValueTransforms

/// `"Overshoot [X]": "max min"` -> `["min", "max"]`.
pub fn split_overshoot_values(fields: &mut Map<String, Value>) {
    for (c_key, value) in fields.iter_mut() {
        if !c_key.to_lowercase().starts_with("overshoot") || !c_key.contains('[') {
            continue;
        }
        let Value::String(c_text) = value else {
            continue;
        };
        let l_parts: Vec<&str> = c_text.split_whitespace().collect();
        if let [c_max, c_min] = l_parts.as_slice() {
            *value = Value::Array(vec![
                Value::String(c_min.to_string()),
                Value::String(c_max.to_string()),
            ]);
        }
    }
}

/// Two numbers joined by `&` or `/` become a two-element list.
pub fn split_number_pairs(fields: &mut Map<String, Value>, date_field_marker: &str, re_pair: &Regex) {
    let c_marker = date_field_marker.to_lowercase();
    for (c_key, value) in fields.iter_mut() {
        if !c_marker.is_empty() && c_key.to_lowercase().contains(&c_marker) {
            continue;
        }
        let Value::String(c_text) = value else {
            continue;
        };
        let Some(captures) = re_pair.captures(c_text) else {
            continue;
        };
        let l_values: Vec<Value> = [captures.get(1), captures.get(2)]
            .into_iter()
            .flatten()
            .map(|m| Value::String(m.as_str().to_string()))
            .collect();
        *value = Value::Array(l_values);
    }
}

/// `[ {..} ]` -> `{..}` for one mapping, up to two levels below it.
fn flatten_single_item_mapping(obj: &mut Map<String, Value>) {
    for sub_value in obj.values_mut() {
        match sub_value {
            Value::Array(items) if items.len() == 1 && items[0].is_object() => {
                let item = items.remove(0);
                *sub_value = item;
            }
            Value::Object(sub_obj) => {
                for nested_value in sub_obj.values_mut() {
                    if let Value::Array(items) = nested_value
                        && items.len() == 1
                        && items[0].is_object()
                    {
                        let item = items.remove(0);
                        *nested_value = item;
                    }
                }
            }
            _ => {}
        }
    }
}

/// Flatten one-item lists of mappings nested inside key-value items and
/// mapping fields.
pub fn flatten_single_item_lists(fields: &mut Map<String, Value>) {
    for value in fields.values_mut() {
        match value {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        flatten_single_item_mapping(obj);
                    }
                }
            }
            Value::Object(obj) => flatten_single_item_mapping(obj),
            _ => {}
        }
    }
}

/// Mapping-valued fields become one-item key-value lists.
pub fn wrap_dict_fields(fields: &mut Map<String, Value>) {
    for value in fields.values_mut() {
        if value.is_object() {
            let obj = value.take();
            *value = Value::Array(vec![obj]);
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(obj) => obj,
            _ => Map::new(),
        }
    }

    fn re_unit() -> Regex {
        Regex::new(r"\[([^\]]+)\]").unwrap()
    }

    #[test]
    fn test_continuation_merges_text_and_dedups_values() {
        let fields = as_map(json!({
            "Info": {"raw_text": "a", "formatted_text": "A", "parsed_data": {"k": "1", "u [V]": "5"}},
            "Other": 1,
            "Info (+1)": {"raw_text": "b", "formatted_text": "B", "parsed_data": {"k": "1", "n": "", "u [V]": "5", "m": "2"}},
        }));
        let merged = merge_continuation_fields(&fields, &SpecNormalizeOptions::default(), &re_unit());

        let l_keys: Vec<&String> = merged.keys().collect();
        assert_eq!(l_keys, vec!["Info", "Other"]);
        assert_eq!(
            merged["Info"]["raw_text"],
            json!("a\n\n--- Additional Data ---\n\nb")
        );
        assert_eq!(
            merged["Info"]["parsed_data"],
            json!({"k": "1", "u [V]": ["5", "5"], "m": "2"})
        );
    }

    #[test]
    fn test_preserve_duplicates_prefix_keeps_lists() {
        let fields = as_map(json!({
            "Stats_A": {"raw_text": "", "formatted_text": "", "parsed_data": {"k": "1"}},
            "Stats_A (+1)": {"raw_text": "", "formatted_text": "", "parsed_data": {"k": "1"}},
        }));
        let options = SpecNormalizeOptions {
            preserve_duplicates_prefixes: vec!["Stats".to_string()],
            ..SpecNormalizeOptions::default()
        };
        let merged = merge_continuation_fields(&fields, &options, &re_unit());
        assert_eq!(merged["Stats_A"]["parsed_data"]["k"], json!(["1", "1"]));

        let options = SpecNormalizeOptions {
            rule_preserve_match: EnumPreserveMatchRule::Exact,
            ..options
        };
        let merged = merge_continuation_fields(&fields, &options, &re_unit());
        assert_eq!(merged["Stats_A"]["parsed_data"]["k"], json!("1"));
    }

    #[test]
    fn test_orphan_continuation_is_kept() {
        let fields = as_map(json!({"Lonely (+1)": "x"}));
        let merged = merge_continuation_fields(&fields, &SpecNormalizeOptions::default(), &re_unit());
        assert_eq!(merged["Lonely (+1)"], json!("x"));
    }

    #[test]
    fn test_overshoot_and_number_pairs() {
        let mut fields = as_map(json!({
            "Overshoot [V]": "3.5 2.1",
            "Overshoot": "3.5 2.1",
            "Pair": "1,5 & 2",
            "Ratio": "10/20",
            "Test Date": "10/20",
            "Text": "a & b",
        }));
        split_overshoot_values(&mut fields);
        split_number_pairs(&mut fields, "date", &SpecNormalizePatterns::new().unwrap().re_number_pair);

        assert_eq!(fields["Overshoot [V]"], json!(["2.1", "3.5"]));
        assert_eq!(fields["Overshoot"], json!("3.5 2.1"));
        assert_eq!(fields["Pair"], json!(["1,5", "2"]));
        assert_eq!(fields["Ratio"], json!(["10", "20"]));
        assert_eq!(fields["Test Date"], json!("10/20"));
        assert_eq!(fields["Text"], json!("a & b"));
    }

    #[test]
    fn test_single_item_lists_and_dict_wrapping() {
        let mut fields = as_map(json!({
            "KV": [{"a": [{"x": 1}], "b": {"c": [{"y": 2}]}}],
            "D": {"p": [{"q": 3}]},
        }));
        flatten_single_item_lists(&mut fields);
        wrap_dict_fields(&mut fields);

        assert_eq!(fields["KV"], json!([{"a": {"x": 1}, "b": {"c": {"y": 2}}}]));
        assert_eq!(fields["D"], json!([{"p": {"q": 3}}]));
    }

    #[test]
    fn test_normalize_documents_uses_fields_mapping() {
        let mut documents = vec![SpecSourceDocument::new(
            "r.json",
            json!([{"title": "T", "fields": {"Info": {"a": 1}}}, "not a report"]),
        )];
        normalize_documents(&mut documents, &SpecNormalizeOptions::default()).unwrap();

        assert_eq!(
            documents[0].value,
            json!([{"title": "T", "fields": {"Info": [{"a": 1}]}}, "not a report"])
        );
    }
}
