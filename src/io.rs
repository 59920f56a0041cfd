//! CSV / NPY artifact I/O for the preprocessing pipeline.
//!
//! Every stage boundary is a file other tooling may depend on, so the
//! readers and writers here are the stable interface of the pipeline:
//!
//! | artifact | layout |
//! |---|---|
//! | combined / cleaned / interpolated / normalized | `ID,time,glc` |
//! | resampled (day-filtered) | `ID,time,date,glc` |
//! | windows | `ID,start_time,glc_0..glc_{L-1}` |
//! | windows + positional encodings | windows columns + `pe_{t}_{d}` |
//! | masked windows / mask labels | NumPy `.npy` arrays |
//!
//! Missing glucose is an empty CSV field on disk and `f64::NAN` in memory.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;
use ndarray_npy::WriteNpyExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::clean::{Reading, TIME_FMT};
use crate::dayfilter::DayRow;
use crate::window::Window;

/// One row of the combined table, before timestamp parsing.
///
/// `time` and `glc` stay as raw text until the [`Cleaner`](crate::clean)
/// coerces them; unit conversion in the combiner only touches rows whose
/// `glc` already parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "ID")]
    pub id: String,
    pub time: String,
    pub glc: String,
}

#[derive(Serialize, Deserialize)]
struct ReadingRow {
    #[serde(rename = "ID")]
    id: String,
    time: String,
    glc: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct DayCsvRow {
    #[serde(rename = "ID")]
    id: String,
    time: String,
    date: NaiveDate,
    glc: Option<f64>,
}

fn opt(glc: f64) -> Option<f64> {
    if glc.is_nan() {
        None
    } else {
        Some(glc)
    }
}

// ── ID/time/glc tables ────────────────────────────────────────────────────

pub fn write_raw_table(path: &Path, rows: &[RawRow]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_raw_table(path: &Path) -> Result<Vec<RawRow>> {
    let mut r = csv::Reader::from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;
    r.deserialize()
        .map(|row| row.map_err(Into::into))
        .collect()
}

/// Write a cleaned/interpolated/normalized table (`ID,time,glc`).
pub fn write_readings(path: &Path, readings: &[Reading]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for r in readings {
        w.serialize(ReadingRow {
            id: r.id.clone(),
            time: r.time.format(TIME_FMT).to_string(),
            glc: opt(r.glc),
        })?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_readings(path: &Path) -> Result<Vec<Reading>> {
    let mut r = csv::Reader::from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut out = Vec::new();
    for row in r.deserialize() {
        let row: ReadingRow = row?;
        let time = NaiveDateTime::parse_from_str(&row.time, TIME_FMT)
            .with_context(|| format!("bad timestamp {:?} in {}", row.time, path.display()))?;
        out.push(Reading {
            id: row.id,
            time,
            glc: row.glc.unwrap_or(f64::NAN),
        });
    }
    Ok(out)
}

/// Write the day-filtered table (`ID,time,date,glc`).
pub fn write_day_rows(path: &Path, rows: &[DayRow]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for r in rows {
        w.serialize(DayCsvRow {
            id: r.id.clone(),
            time: r.time.format(TIME_FMT).to_string(),
            date: r.date,
            glc: opt(r.glc),
        })?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_day_rows(path: &Path) -> Result<Vec<DayRow>> {
    let mut r = csv::Reader::from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut out = Vec::new();
    for row in r.deserialize() {
        let row: DayCsvRow = row?;
        let time = NaiveDateTime::parse_from_str(&row.time, TIME_FMT)
            .with_context(|| format!("bad timestamp {:?} in {}", row.time, path.display()))?;
        out.push(DayRow {
            id: row.id,
            time,
            date: row.date,
            glc: row.glc.unwrap_or(f64::NAN),
        });
    }
    Ok(out)
}

/// Visit a table one `(ID, rows)` group at a time without materializing the
/// whole file.
///
/// Rows are required to be grouped by ID on disk (every table artifact is
/// written sorted by `(ID, time)`), so a group boundary is simply a change of
/// ID between consecutive rows — an ID never wraps across two callbacks.
pub fn for_each_group<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(&str, Vec<Reading>) -> Result<()>,
{
    let mut r = csv::Reader::from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut current_id: Option<String> = None;
    let mut group: Vec<Reading> = Vec::new();
    for row in r.deserialize() {
        let row: ReadingRow = row?;
        let time = NaiveDateTime::parse_from_str(&row.time, TIME_FMT)
            .with_context(|| format!("bad timestamp {:?} in {}", row.time, path.display()))?;
        if current_id.as_deref() != Some(row.id.as_str()) {
            if let Some(id) = current_id.take() {
                f(&id, std::mem::take(&mut group))?;
            }
            current_id = Some(row.id.clone());
        }
        group.push(Reading {
            id: row.id,
            time,
            glc: row.glc.unwrap_or(f64::NAN),
        });
    }
    if let Some(id) = current_id {
        f(&id, group)?;
    }
    Ok(())
}

// ── Windows table ─────────────────────────────────────────────────────────

/// Incremental writer for the windows table
/// (`ID,start_time,glc_0..glc_{L-1}`).
pub struct WindowWriter {
    w: csv::Writer<File>,
    window_len: usize,
}

impl WindowWriter {
    pub fn create(path: &Path, window_len: usize) -> Result<Self> {
        let mut w = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut header = vec!["ID".to_string(), "start_time".to_string()];
        header.extend((0..window_len).map(|j| format!("glc_{j}")));
        w.write_record(&header)?;
        Ok(Self { w, window_len })
    }

    pub fn write(&mut self, window: &Window) -> Result<()> {
        // A short window here is an internal invariant violation, not a skip.
        anyhow::ensure!(
            window.glc.len() == self.window_len,
            "window for {} at {} has {} values, expected {}",
            window.id,
            window.start_time,
            window.glc.len(),
            self.window_len
        );
        let mut record = vec![
            window.id.clone(),
            window.start_time.format(TIME_FMT).to_string(),
        ];
        record.extend(window.glc.iter().map(|v| format_glc(*v)));
        self.w.write_record(&record)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

fn format_glc(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v}")
    }
}

pub fn read_windows(path: &Path) -> Result<Vec<Window>> {
    let mut r = csv::Reader::from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let n_cols = r.headers()?.len();
    anyhow::ensure!(n_cols > 2, "windows table {} has no glc columns", path.display());
    let mut out = Vec::new();
    for record in r.records() {
        let record = record?;
        let id = record[0].to_string();
        let start_time = NaiveDateTime::parse_from_str(&record[1], TIME_FMT)
            .with_context(|| format!("bad start_time {:?} in {}", &record[1], path.display()))?;
        let glc = record
            .iter()
            .skip(2)
            .map(|s| if s.is_empty() { f64::NAN } else { s.parse().unwrap_or(f64::NAN) })
            .collect();
        out.push(Window { id, start_time, glc });
    }
    Ok(out)
}

// ── Encoded-windows table ─────────────────────────────────────────────────

/// Incremental writer for the windows-with-positional-encodings table.
///
/// Header: `ID,start_time,glc_0..glc_{L-1},pe_0_0..pe_{L-1}_{D-1}`; the
/// per-timestep `pe_{t}_{d}` naming is the documented fixed layout consumed
/// in reverse by the model.
pub struct EncodedWriter {
    w: csv::Writer<File>,
    feature_len: usize,
}

impl EncodedWriter {
    pub fn create(path: &Path, window_len: usize, embed_dim: usize) -> Result<Self> {
        let mut w = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut header = vec!["ID".to_string(), "start_time".to_string()];
        header.extend((0..window_len).map(|t| format!("glc_{t}")));
        for t in 0..window_len {
            for d in 0..embed_dim {
                header.push(format!("pe_{t}_{d}"));
            }
        }
        w.write_record(&header)?;
        Ok(Self {
            w,
            feature_len: window_len * (1 + embed_dim),
        })
    }

    /// Append one chunk of encoded rows.  `meta[i]` is `(ID, start_time)` for
    /// `rows[i]`; separator rows carry an empty ID and no timestamp.
    pub fn write_chunk(
        &mut self,
        meta: &[(String, Option<NaiveDateTime>)],
        rows: &Array2<f32>,
    ) -> Result<()> {
        anyhow::ensure!(
            rows.nrows() == meta.len() && rows.ncols() == self.feature_len,
            "encoded chunk shape {:?} does not match {} meta rows × {} features",
            rows.dim(),
            meta.len(),
            self.feature_len
        );
        for (i, (id, start)) in meta.iter().enumerate() {
            let mut record = vec![
                id.clone(),
                start.map(|t| t.format(TIME_FMT).to_string()).unwrap_or_default(),
            ];
            record.extend(rows.row(i).iter().map(|v| format!("{v}")));
            self.w.write_record(&record)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

// ── Binary arrays ─────────────────────────────────────────────────────────

/// Write a 2-D f32 array as a NumPy `.npy` file.
pub fn write_npy_f32(path: &Path, arr: &Array2<f32>) -> Result<()> {
    let f = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    arr.write_npy(f)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write a 2-D boolean array as a NumPy `.npy` file.
pub fn write_npy_bool(path: &Path, arr: &Array2<bool>) -> Result<()> {
    let f = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    arr.write_npy(f)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
