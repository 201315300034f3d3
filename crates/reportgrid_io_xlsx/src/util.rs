//! Pure helpers for the XLSX writer.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use reportgrid_layout::SpecSheetHorizontalMerge;

use crate::conf::{C_PARTIAL_SUFFIX, N_WIDTH_EXCEL_COL_MAX};
use crate::spec::SpecAutofitCellsPolicy;

////////////////////////////////////////////////////////////////////////////////
// #region HeaderMerges

/// Group planned merges by header row.
pub fn derive_horizontal_merges_by_row(
    merges: &[SpecSheetHorizontalMerge],
) -> BTreeMap<usize, Vec<&SpecSheetHorizontalMerge>> {
    let mut dict_merges_by_row: BTreeMap<usize, Vec<&SpecSheetHorizontalMerge>> = BTreeMap::new();
    for merge in merges {
        dict_merges_by_row.entry(merge.row_idx).or_default().push(merge);
    }
    dict_merges_by_row
}

/// Cells covered by a merge, excluding each merge's anchor cell.
pub fn derive_horizontal_merge_tracker(
    merges: &[SpecSheetHorizontalMerge],
) -> BTreeSet<(usize, usize)> {
    let mut set_merged_cells = BTreeSet::new();
    for merge in merges {
        for col_idx in (merge.col_idx_start + 1)..=merge.col_idx_end {
            set_merged_cells.insert((merge.row_idx, col_idx));
        }
    }
    set_merged_cells
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Autofit

/// Estimate displayed width units; non-ASCII characters count 1.6.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Final column width from the widest recorded text.
pub fn calculate_autofit_width(n_width_recorded: usize, policy: &SpecAutofitCellsPolicy) -> usize {
    let n_min = usize::max(1, policy.width_cell_min);
    let n_max = usize::min(
        N_WIDTH_EXCEL_COL_MAX,
        usize::max(n_min, policy.width_cell_max),
    );
    usize::min(
        n_max,
        usize::max(n_min, n_width_recorded + policy.width_cell_padding),
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Paths

/// Sibling path the workbook is saved to before being renamed into place.
pub fn derive_partial_path(path_file_out: &Path) -> PathBuf {
    let mut c_name = path_file_out
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("workbook.xlsx"));
    c_name.push(".");
    c_name.push(C_PARTIAL_SUFFIX);
    path_file_out.with_file_name(c_name)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(row_idx: usize, col_idx_start: usize, col_idx_end: usize) -> SpecSheetHorizontalMerge {
        SpecSheetHorizontalMerge {
            row_idx,
            col_idx_start,
            col_idx_end,
            text: "X".to_string(),
        }
    }

    #[test]
    fn test_merge_tracker_skips_anchor_cells() {
        let l_merges = vec![merge(0, 1, 3), merge(1, 1, 2)];
        let set_merged = derive_horizontal_merge_tracker(&l_merges);

        assert!(!set_merged.contains(&(0, 1)));
        assert!(set_merged.contains(&(0, 2)));
        assert!(set_merged.contains(&(0, 3)));
        assert!(set_merged.contains(&(1, 2)));
        assert_eq!(set_merged.len(), 3);

        let dict_by_row = derive_horizontal_merges_by_row(&l_merges);
        assert_eq!(dict_by_row[&0].len(), 1);
        assert_eq!(dict_by_row[&1][0].col_idx_end, 2);
    }

    #[test]
    fn test_autofit_width_is_clamped() {
        let policy = SpecAutofitCellsPolicy::default();
        assert_eq!(calculate_autofit_width(0, &policy), 8);
        assert_eq!(calculate_autofit_width(10, &policy), 12);
        assert_eq!(calculate_autofit_width(500, &policy), 60);
    }

    #[test]
    fn test_unicode_width_weights_non_ascii() {
        assert_eq!(estimate_unicode_string_width("abc"), 3);
        assert_eq!(estimate_unicode_string_width("温度"), 3);
    }

    #[test]
    fn test_partial_path_is_sibling() {
        let path = derive_partial_path(Path::new("/tmp/out/report.xlsx"));
        assert_eq!(path, PathBuf::from("/tmp/out/report.xlsx.partial"));
    }
}
