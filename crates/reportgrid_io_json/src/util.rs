use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::spec::{ReadJsonError, SpecReadJsonOptions};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) struct SpecReadPatterns {
    pub(crate) patterns_include_files: Option<GlobSet>,
    pub(crate) patterns_exclude_files: Option<GlobSet>,
    pub(crate) patterns_exclude_dirs: Option<GlobSet>,
}

impl SpecReadPatterns {
    pub(crate) fn from_options(options: &SpecReadJsonOptions) -> Result<Self, ReadJsonError> {
        let if_ci = options.if_case_insensitive;
        Ok(Self {
            patterns_include_files: _compile(&options.patterns_include_files, if_ci)?,
            patterns_exclude_files: _compile(&options.patterns_exclude_files, if_ci)?,
            patterns_exclude_dirs: _compile(&options.patterns_exclude_dirs, if_ci)?,
        })
    }

    /// Include (no patterns = everything) and not excluded.
    pub(crate) fn should_read_file(&self, name_file: &str) -> bool {
        let b_included = self
            .patterns_include_files
            .as_ref()
            .is_none_or(|set| set.is_match(name_file));
        let b_excluded = self
            .patterns_exclude_files
            .as_ref()
            .is_some_and(|set| set.is_match(name_file));
        b_included && !b_excluded
    }

    pub(crate) fn should_descend_dir(&self, name_dir: &str) -> bool {
        !self
            .patterns_exclude_dirs
            .as_ref()
            .is_some_and(|set| set.is_match(name_dir))
    }
}

fn _compile(patterns: &[String], if_case_insensitive: bool) -> Result<Option<GlobSet>, ReadJsonError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(if_case_insensitive)
            .build()
            .map_err(|e| ReadJsonError::InvalidPattern(e.to_string()))?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| ReadJsonError::InvalidPattern(e.to_string()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workers

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_match_json_case_insensitively() {
        let patterns = SpecReadPatterns::from_options(&SpecReadJsonOptions::default()).unwrap();
        assert!(patterns.should_read_file("a.json"));
        assert!(patterns.should_read_file("B.JSON"));
        assert!(!patterns.should_read_file("c.txt"));
        assert!(patterns.should_descend_dir("sub"));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let options = SpecReadJsonOptions {
            patterns_include_files: vec!["[".to_string()],
            ..SpecReadJsonOptions::default()
        };
        assert!(matches!(
            SpecReadPatterns::from_options(&options),
            Err(ReadJsonError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_worker_limit_is_at_least_one() {
        assert_eq!(calculate_worker_limit(Some(0)), 1);
        assert!(calculate_worker_limit(None) >= 1);
    }
}
