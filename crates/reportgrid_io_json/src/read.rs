//! Directory traversal and parallel JSON parsing.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use reportgrid_layout::SpecSourceDocument;
use serde_json::Value;

use crate::report::{ReportReadJson, ReportReadJsonBuilder};
use crate::spec::{ReadJsonError, SpecReadJsonOptions};
use crate::util::{SpecReadPatterns, calculate_worker_limit};

#[derive(Debug, Clone)]
struct SpecReadTaskFile {
    path_file_src: PathBuf,
    source_id: String,
}

#[derive(Debug)]
struct SpecReadContext {
    path_dir_src: PathBuf,
    spec_read_options: SpecReadJsonOptions,
    spec_read_pats: SpecReadPatterns,
    builder_read_report: ReportReadJsonBuilder,
    l_tasks_file_read: Vec<SpecReadTaskFile>,
}

/// Load every matching JSON file under `dir_source`.
///
/// Traversal order is deterministic: entries sorted by name, subdirectories
/// of a directory before its files. Source identifiers are paths relative to
/// `dir_source` with `/` separators.
///
/// Malformed or unreadable files are recorded in [`ReportReadJson`] and
/// skipped. Returns [`ReadJsonError`] only for setup failures.
pub fn read_json_documents<P>(
    dir_source: P,
    spec_read_options: SpecReadJsonOptions,
) -> Result<(Vec<SpecSourceDocument>, ReportReadJson), ReadJsonError>
where
    P: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref().to_path_buf();
    if !path_dir_src.is_dir() {
        return Err(ReadJsonError::SourceNotDirectory(path_dir_src));
    }
    let spec_read_pats = SpecReadPatterns::from_options(&spec_read_options)?;

    let mut spec_read_ctx = SpecReadContext {
        path_dir_src: path_dir_src.clone(),
        spec_read_options,
        spec_read_pats,
        builder_read_report: ReportReadJsonBuilder::default(),
        l_tasks_file_read: Vec::new(),
    };

    walk_directory(&path_dir_src, &mut spec_read_ctx);
    let l_documents = flush_file_read_tasks(&mut spec_read_ctx);
    Ok((l_documents, spec_read_ctx.builder_read_report.build()))
}

fn parse_json_file(path_file_src: &Path) -> Result<Value, String> {
    let c_text = fs::read_to_string(path_file_src).map_err(|e| e.to_string())?;
    serde_json::from_str(&c_text).map_err(|e| format!("Invalid JSON: {e}"))
}

fn flush_file_read_tasks(spec_read_ctx: &mut SpecReadContext) -> Vec<SpecSourceDocument> {
    let l_tasks_file_read = std::mem::take(&mut spec_read_ctx.l_tasks_file_read);
    if l_tasks_file_read.is_empty() {
        return Vec::new();
    }

    let parse_task =
        |spec_task: SpecReadTaskFile| -> (SpecReadTaskFile, Result<Value, String>) {
            let res_parse = parse_json_file(&spec_task.path_file_src);
            (spec_task, res_parse)
        };

    let n_workers_max = calculate_worker_limit(spec_read_ctx.spec_read_options.num_workers_max);
    let l_results = if n_workers_max <= 1 {
        l_tasks_file_read.into_iter().map(parse_task).collect::<Vec<_>>()
    } else {
        match ThreadPoolBuilder::new().num_threads(n_workers_max).build() {
            Ok(thread_pool) => thread_pool.install(|| {
                l_tasks_file_read
                    .into_par_iter()
                    .map(parse_task)
                    .collect::<Vec<_>>()
            }),
            Err(_) => {
                spec_read_ctx.builder_read_report.add_warning(format!(
                    "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial read."
                ));
                l_tasks_file_read.into_iter().map(parse_task).collect::<Vec<_>>()
            }
        }
    };

    let mut l_documents = Vec::with_capacity(l_results.len());
    for (spec_task, res_parse) in l_results {
        match res_parse {
            Ok(value) => {
                spec_read_ctx.builder_read_report.add_loaded();
                log::debug!("loaded {}", spec_task.source_id);
                l_documents.push(SpecSourceDocument::new(spec_task.source_id, value));
            }
            Err(msg) => spec_read_ctx
                .builder_read_report
                .add_error(spec_task.path_file_src, msg),
        }
    }
    l_documents
}

/// Relative path with `/` separators.
fn derive_source_id(path_entry: &Path, path_dir_src: &Path) -> String {
    let path_rel = path_entry.strip_prefix(path_dir_src).unwrap_or(path_entry);
    path_rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_directory(path_root: &Path, spec_read_ctx: &mut SpecReadContext) {
    let iter_entries = match fs::read_dir(path_root) {
        Ok(iter) => iter,
        Err(e) => {
            spec_read_ctx.builder_read_report.add_warning(format!(
                "Failed to read directory {} ({e})",
                path_root.display()
            ));
            return;
        }
    };

    let mut l_dirs: Vec<(String, PathBuf)> = Vec::new();
    let mut l_files: Vec<(String, PathBuf)> = Vec::new();
    for _entry_res in iter_entries {
        let entry = match _entry_res {
            Ok(v) => v,
            Err(e) => {
                spec_read_ctx.builder_read_report.add_warning(format!(
                    "Failed to read directory entry under {} ({e})",
                    path_root.display()
                ));
                continue;
            }
        };

        let path_entry = entry.path();
        let c_name = entry.file_name().to_string_lossy().to_string();
        if path_entry.is_dir() {
            l_dirs.push((c_name, path_entry));
        } else if path_entry.is_file() {
            l_files.push((c_name, path_entry));
        } else {
            spec_read_ctx
                .builder_read_report
                .add_warning(format!("Special file skipped: {}", path_entry.display()));
        }
    }

    l_dirs.sort_by(|a, b| a.0.cmp(&b.0));
    l_files.sort_by(|a, b| a.0.cmp(&b.0));

    if spec_read_ctx.spec_read_options.if_recursive {
        for (c_name, path_dir_sub) in l_dirs {
            if spec_read_ctx.spec_read_pats.should_descend_dir(&c_name) {
                walk_directory(&path_dir_sub, spec_read_ctx);
            }
        }
    }

    for (c_name, path_file_src) in l_files {
        spec_read_ctx.builder_read_report.add_scanned();
        if !spec_read_ctx.spec_read_pats.should_read_file(&c_name) {
            continue;
        }
        spec_read_ctx.builder_read_report.add_matched();
        let source_id = derive_source_id(&path_file_src, &spec_read_ctx.path_dir_src);
        spec_read_ctx.l_tasks_file_read.push(SpecReadTaskFile {
            path_file_src,
            source_id,
        });
    }
}
