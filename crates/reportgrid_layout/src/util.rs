//! Stateless helper utilities used by the layout kernel.

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};

////////////////////////////////////////////////////////////////////////////////
// #region ColumnMath

/// Product of all dimensions, each floored to 1.
///
/// An empty dimension vector reserves a single column.
pub fn calculate_total_columns(dimensions: &[usize]) -> usize {
    dimensions
        .iter()
        .fold(1usize, |n_acc, n_dim| n_acc.saturating_mul(usize::max(1, *n_dim)))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Remove invalid chars and trim to valid Excel sheet name.
///
/// Excel also rejects names that begin or end with an apostrophe, so
/// apostrophes are trimmed along with whitespace, before and after the
/// length cap.
pub fn sanitize_sheet_name(name: &str) -> String {
    let c_name: String = name
        .chars()
        .filter(|c| !TUP_EXCEL_ILLEGAL.contains(c))
        .collect();
    let c_name = trim_sheet_name_edges(&c_name);

    let c_name: String = c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect();
    let c_name = trim_sheet_name_edges(&c_name);
    if c_name.is_empty() {
        return "Sheet".to_string();
    }
    c_name.to_string()
}

fn trim_sheet_name_edges(name: &str) -> &str {
    name.trim_matches(|c: char| c.is_whitespace() || c == '\'')
}

/// Create suffixed sheet name (`base_2`, `base_3`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, part_idx_1based: usize) -> String {
    let c_sheet_name_suffix = format!("_{part_idx_1based}");
    let n_len_base_name_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Identifier

/// Display identifier of a source: the relative path with the extension of
/// its last component removed, every occurrence of `filter_text` removed,
/// trimmed.
///
/// Directories are kept so that `a/TR.json` and `b/TR.json` stay distinct.
pub fn derive_display_identifier(source_id: &str, filter_text: &str) -> String {
    let n_pos_name = source_id.rfind(['/', '\\']).map_or(0, |n_pos| n_pos + 1);
    let c_stem = match source_id[n_pos_name..].rfind('.') {
        Some(n_pos) if n_pos > 0 => &source_id[..n_pos_name + n_pos],
        _ => source_id,
    };

    let c_display = if filter_text.is_empty() {
        c_stem.to_string()
    } else {
        c_stem.replace(filter_text, "")
    };
    c_display.trim().to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_total_columns_floors_each_level() {
        assert_eq!(calculate_total_columns(&[]), 1);
        assert_eq!(calculate_total_columns(&[0]), 1);
        assert_eq!(calculate_total_columns(&[3]), 3);
        assert_eq!(calculate_total_columns(&[2, 0, 3]), 6);
    }

    #[test]
    fn test_sanitize_sheet_name_strips_and_truncates() {
        assert_eq!(sanitize_sheet_name("Run [1]/2: ok?"), "Run 12 ok");
        assert_eq!(sanitize_sheet_name("  *?  "), "Sheet");

        let c_long = "A".repeat(40);
        assert_eq!(sanitize_sheet_name(&c_long).chars().count(), 31);
    }

    #[test]
    fn test_sanitize_sheet_name_trims_edge_apostrophes() {
        assert_eq!(sanitize_sheet_name("'Quoted'"), "Quoted");
        assert_eq!(sanitize_sheet_name(" ' Run's log ' "), "Run's log");
        assert_eq!(sanitize_sheet_name("''"), "Sheet");
        assert_eq!(sanitize_sheet_name("'*'"), "Sheet");

        // Truncation can expose an apostrophe at the end.
        let c_name = format!("{}'tail", "C".repeat(30));
        assert_eq!(sanitize_sheet_name(&c_name), "C".repeat(30));
    }

    #[test]
    fn test_create_sheet_identifier_respects_cap() {
        assert_eq!(create_sheet_identifier("Report", 2), "Report_2");

        let c_long = "B".repeat(31);
        let c_name = create_sheet_identifier(&c_long, 12);
        assert_eq!(c_name.chars().count(), 31);
        assert!(c_name.ends_with("_12"));
    }

    #[test]
    fn test_derive_display_identifier() {
        assert_eq!(derive_display_identifier("sub/TR-001.json", ""), "sub/TR-001");
        assert_eq!(
            derive_display_identifier("TR-001_extracted.json", "_extracted"),
            "TR-001"
        );
        assert_eq!(derive_display_identifier("archive.tar.json", ""), "archive.tar");
        assert_eq!(derive_display_identifier(".hidden", ""), ".hidden");
        assert_eq!(derive_display_identifier("run.v2/.hidden", ""), "run.v2/.hidden");
        assert_eq!(derive_display_identifier("run.v2/TR", ""), "run.v2/TR");
    }

    #[test]
    fn test_display_identifier_keeps_directories_distinct() {
        let c_first = derive_display_identifier("sub1/TR_raw.json", "_raw");
        let c_second = derive_display_identifier("sub2/TR_raw.json", "_raw");

        assert_eq!(c_first, "sub1/TR");
        assert_eq!(c_second, "sub2/TR");
        assert_ne!(c_first, c_second);
    }
}
