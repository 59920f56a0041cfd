//! Combining: union all normalized per-source tables into one.
//!
//! Each study's preprocessor writes a standardized CSV (`<source>_*.csv`)
//! with `id|ID`, `time`, `gl|glc` columns.  Combining namespaces every ID by
//! its source prefix, applies the mmol/L → mg/dL correction for sources that
//! export in mmol/L, and concatenates everything into one `ID,time,glc`
//! table.
//!
//! A source file missing a required column is a fatal schema error: silently
//! mis-mapped columns would corrupt every downstream ID.

use anyhow::{bail, Context, Result};
use log::info;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::io::RawRow;

/// mmol/L → mg/dL.
pub const MMOL_TO_MGDL: f64 = 18.0;

/// Counts surfaced to the operator after combining.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineReport {
    pub files: usize,
    pub rows: usize,
    /// Rows whose glucose was converted from mmol/L.
    pub converted_rows: usize,
}

/// Source prefix of a standardized file: everything before the first `_`.
pub fn source_prefix(filename: &str) -> Option<&str> {
    filename.split('_').next().filter(|p| !p.is_empty())
}

/// Combine every `*.csv` under `dir` into one namespaced table.
///
/// Files are visited in lexical order so the combined artifact is
/// reproducible regardless of directory-listing order.
pub fn combine_dir(dir: &Path, cfg: &PipelineConfig) -> Result<(Vec<RawRow>, CombineReport)> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("listing source directory {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no source CSV files found under {}", dir.display());
    }

    let mut out = Vec::new();
    let mut report = CombineReport::default();
    for path in &paths {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let Some(source) = source_prefix(filename) else {
            bail!("cannot derive a source prefix from file name {filename:?}");
        };
        let n_before = out.len();
        let converted = combine_file(path, source, cfg, &mut out)?;
        info!(
            "combined {}: {} rows from source {source:?}{}",
            filename,
            out.len() - n_before,
            if converted > 0 { " (mmol/L converted)" } else { "" }
        );
        report.files += 1;
        report.converted_rows += converted;
    }
    report.rows = out.len();
    Ok((out, report))
}

/// Append one source file's rows to `out`, returning the number of
/// unit-converted rows.
fn combine_file(
    path: &Path,
    source: &str,
    cfg: &PipelineConfig,
    out: &mut Vec<RawRow>,
) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;

    // Header aliasing: `id` → `ID`, `gl` → `glc`.
    let headers = reader.headers()?.clone();
    let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.trim()));
    let id_col = find(&["ID", "id"]);
    let time_col = find(&["time"]);
    let glc_col = find(&["glc", "gl"]);

    let missing: Vec<&str> = [("ID", id_col), ("time", time_col), ("glc", glc_col)]
        .iter()
        .filter(|(_, col)| col.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        bail!(
            "source file {} is missing columns: {}",
            path.display(),
            missing.join(", ")
        );
    }
    let (id_col, time_col, glc_col) = (id_col.unwrap(), time_col.unwrap(), glc_col.unwrap());

    let is_mmol = cfg.mmol_sources.iter().any(|s| s == source);
    let mut converted = 0usize;
    for record in reader.records() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        let mut glc = record.get(glc_col).unwrap_or("").trim().to_string();
        if is_mmol {
            // Conversion only touches values that parse; unparsable text is
            // left for the cleaner to coerce to missing.
            if let Ok(v) = glc.parse::<f64>() {
                glc = format!("{}", v * MMOL_TO_MGDL);
                converted += 1;
            }
        }
        out.push(RawRow {
            id: format!("{source}_{}", record.get(id_col).unwrap_or("").trim()),
            time: record.get(time_col).unwrap_or("").trim().to_string(),
            glc,
        });
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_source(dir: &Path, name: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn namespaces_ids_and_aliases_headers() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "aleppo_cgm.csv", "id,time,gl\n7,2020-01-01 00:00:00,120\n");
        let (rows, report) = combine_dir(dir.path(), &PipelineConfig::default()).unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "aleppo_7");
        assert_eq!(rows[0].glc, "120");
    }

    #[test]
    fn mmol_sources_are_converted() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "dexi_cgm.csv", "ID,time,glc\n1,2020-01-01 00:00:00,5.5\n");
        let (rows, report) = combine_dir(dir.path(), &PipelineConfig::default()).unwrap();
        assert_eq!(rows[0].glc, "99");
        assert_eq!(report.converted_rows, 1);
    }

    #[test]
    fn missing_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "aleppo_cgm.csv", "id,when,gl\n7,2020-01-01,120\n");
        let err = combine_dir(dir.path(), &PipelineConfig::default()).unwrap_err();
        assert!(err.to_string().contains("time"), "{err}");
    }

    #[test]
    fn unparsable_mmol_value_left_for_cleaner() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "dexi_cgm.csv", "ID,time,glc\n1,2020-01-01 00:00:00,Low\n");
        let (rows, report) = combine_dir(dir.path(), &PipelineConfig::default()).unwrap();
        assert_eq!(rows[0].glc, "Low");
        assert_eq!(report.converted_rows, 0);
    }
}
