//! Per-cell scalar typing pipeline.
//!
//! Fixed order: comma normalization, unit stripping, date parsing (date
//! fields only), numeric conversion, text.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use crate::spec::{EnumCellValue, LayoutError, SpecValuePolicy};

/// Largest integer magnitude an `f64` represents exactly.
const N_F64_SAFE_INT_MAX: f64 = 9_007_199_254_740_992.0;

/// Compiled form of [`SpecValuePolicy`].
#[derive(Debug, Clone)]
pub struct SpecValueFilters {
    if_replace_commas: bool,
    if_strip_units: bool,
    l_unit_patterns: Vec<Regex>,
    c_date_field_marker: String,
    l_date_formats: Vec<String>,
    if_parse_compact_dates: bool,
    re_numeric: Regex,
}

impl SpecValueFilters {
    /// Compile a value policy.
    pub fn from_policy(policy: &SpecValuePolicy) -> Result<Self, LayoutError> {
        let l_unit_patterns = policy
            .unit_patterns
            .iter()
            .map(|c_pattern| compile_pattern(c_pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            if_replace_commas: policy.if_replace_commas,
            if_strip_units: policy.if_strip_units,
            l_unit_patterns,
            c_date_field_marker: policy.date_field_marker.to_lowercase(),
            l_date_formats: policy.date_formats.clone(),
            if_parse_compact_dates: policy.if_parse_compact_dates,
            re_numeric: compile_pattern(r"^-?(?:\d+\.?\d*|\.\d+)$")?,
        })
    }

    /// Whether `field_label` names a date field.
    pub fn is_date_field(&self, field_label: &str) -> bool {
        !self.c_date_field_marker.is_empty()
            && field_label
                .to_lowercase()
                .contains(&self.c_date_field_marker)
    }

    /// Type one leaf value for the column labeled `field_label`.
    pub fn derive_cell_value(&self, value: Option<&Value>, field_label: &str) -> EnumCellValue {
        match value {
            None | Some(Value::Null) => EnumCellValue::Empty,
            Some(Value::Bool(b)) => {
                EnumCellValue::String(if *b { "True" } else { "False" }.to_string())
            }
            Some(Value::Number(n)) => {
                if self.is_date_field(field_label)
                    && let Some(date) = self.parse_date(&n.to_string())
                {
                    return EnumCellValue::Date(date);
                }
                if let Some(n_int) = n.as_i64() {
                    return EnumCellValue::Integer(n_int);
                }
                n.as_f64()
                    .map_or(EnumCellValue::Empty, convert_float_to_cell)
            }
            Some(Value::String(s)) => self.convert_text(s, field_label),
            Some(Value::Array(items)) if items.is_empty() => EnumCellValue::Empty,
            Some(Value::Object(obj)) if obj.is_empty() => EnumCellValue::Empty,
            Some(other) => EnumCellValue::String(other.to_string()),
        }
    }

    /// Type one text value.
    pub fn convert_text(&self, text: &str, field_label: &str) -> EnumCellValue {
        let mut c_text = if self.if_replace_commas {
            text.replace(',', ".")
        } else {
            text.to_string()
        };
        if self.if_strip_units {
            for re_unit in &self.l_unit_patterns {
                c_text = re_unit.replace_all(&c_text, "").into_owned();
            }
        }
        let c_text = c_text.trim();
        if c_text.is_empty() {
            return EnumCellValue::Empty;
        }

        if self.is_date_field(field_label)
            && let Some(date) = self.parse_date(c_text)
        {
            return EnumCellValue::Date(date);
        }

        if self.re_numeric.is_match(c_text) {
            if !c_text.contains('.')
                && let Ok(n_int) = c_text.parse::<i64>()
            {
                return EnumCellValue::Integer(n_int);
            }
            if let Ok(n_float) = c_text.parse::<f64>() {
                return convert_float_to_cell(n_float);
            }
        }

        EnumCellValue::String(c_text.to_string())
    }

    /// First matching date pattern wins; compact `YYYYMMDD` last.
    pub fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let c_text = text.trim();
        for c_format in &self.l_date_formats {
            let parsed = if c_format.contains("%H") {
                NaiveDateTime::parse_from_str(c_text, c_format)
                    .map(|dt| dt.date())
                    .ok()
            } else {
                NaiveDate::parse_from_str(c_text, c_format).ok()
            };
            if parsed.is_some() {
                return parsed;
            }
        }

        if self.if_parse_compact_dates
            && c_text.len() == 8
            && c_text.bytes().all(|b| b.is_ascii_digit())
        {
            let n_year = c_text[0..4].parse::<i32>().ok()?;
            let n_month = c_text[4..6].parse::<u32>().ok()?;
            let n_day = c_text[6..8].parse::<u32>().ok()?;
            return NaiveDate::from_ymd_opt(n_year, n_month, n_day);
        }
        None
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, LayoutError> {
    Regex::new(pattern).map_err(|e| LayoutError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Integer when the value has no fractional part, else float.
fn convert_float_to_cell(n_float: f64) -> EnumCellValue {
    if n_float.is_finite() && n_float.fract() == 0.0 && n_float.abs() <= N_F64_SAFE_INT_MAX {
        EnumCellValue::Integer(n_float as i64)
    } else {
        EnumCellValue::Float(n_float)
    }
}
