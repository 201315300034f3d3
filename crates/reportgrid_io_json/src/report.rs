//! Read report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::SpecReadJsonError;

/// Aggregate counters and diagnostics for one `read_json_documents` run.
#[derive(Debug, Default, Clone)]
pub struct ReportReadJson {
    /// Total scanned file entries.
    pub cnt_scanned: u64,
    /// Number of scanned files that matched filters.
    pub cnt_matched: u64,
    /// Number of documents parsed successfully.
    pub cnt_loaded: u64,
    /// Non-fatal warnings collected during traversal.
    pub warnings: Vec<String>,
    /// Per-file failures.
    pub errors: Vec<SpecReadJsonError>,
}

impl ReportReadJson {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_loaded".to_string(), self.cnt_loaded);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} scanned={} matched={} loaded={} errors={} warnings={}",
            dict_counts["cnt_scanned"],
            dict_counts["cnt_matched"],
            dict_counts["cnt_loaded"],
            dict_counts["cnt_errors"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportReadJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[READ]"))
    }
}

/// Mutable accumulator for read statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportReadJsonBuilder {
    /// See [`ReportReadJson::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportReadJson::cnt_matched`].
    pub cnt_matched: u64,
    /// See [`ReportReadJson::cnt_loaded`].
    pub cnt_loaded: u64,
    /// See [`ReportReadJson::errors`].
    pub errors: Vec<SpecReadJsonError>,
    /// See [`ReportReadJson::warnings`].
    pub warnings: Vec<String>,
}

impl ReportReadJsonBuilder {
    /// Increment scanned count by one.
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    /// Increment matched count by one.
    pub fn add_matched(&mut self) {
        self.cnt_matched += 1;
    }

    /// Increment loaded count by one.
    pub fn add_loaded(&mut self) {
        self.cnt_loaded += 1;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Add one path-scoped error.
    pub fn add_error(&mut self, path: PathBuf, exception: String) {
        log::warn!("{}: {exception}", path.display());
        self.errors.push(SpecReadJsonError { path, exception });
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportReadJson {
        ReportReadJson {
            cnt_scanned: self.cnt_scanned,
            cnt_matched: self.cnt_matched,
            cnt_loaded: self.cnt_loaded,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReportReadJson;

    #[test]
    fn report_read_json_to_dict_and_format() {
        let report = ReportReadJson {
            cnt_scanned: 4,
            cnt_matched: 3,
            cnt_loaded: 2,
            warnings: vec![],
            errors: vec![crate::spec::SpecReadJsonError {
                path: "bad.json".into(),
                exception: "EOF".to_string(),
            }],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_loaded"], 2);
        assert_eq!(dict_counts["cnt_errors"], 1);

        let txt = report.format("[READ]");
        assert_eq!(
            txt,
            "[READ] scanned=4 matched=3 loaded=2 errors=1 warnings=0"
        );
        assert_eq!(report.to_string(), txt);
    }
}
