//! # cgm-prep — CGM pretraining-dataset preprocessing in pure Rust
//!
//! `cgm-prep` turns raw multi-study continuous-glucose-monitor exports into
//! fixed-length numeric windows with reproducible masking, ready for
//! self-supervised (masked-value imputation) sequence-model pretraining.
//!
//! ## Pipeline overview
//!
//! ```text
//! <source>_*.csv  (one standardized {ID, time, glc} table per study)
//!   │
//!   ├─ combine      namespace IDs by source, mmol/L → mg/dL where needed
//!   ├─ clean        round to 1 min, dedup (ID,time), coerce glc, sort
//!   ├─ interpolate  5-min grid, PCHIP fill of gaps ≤ 20 min
//!   ├─ dayfilter    drop days with < 90% of 288 readings, reindex to 288
//!   ├─ normalize    global min-max → [0,1], missing → -1, persist scaler
//!   ├─ window       length 288, stride 144 (50% overlap) per ID
//!   ├─ encode       + sinusoidal positional block (D = 32, tiled)
//!   └─ mask         Bernoulli(0.2) per glucose position, seeded
//!        │
//!        └─→ masked_windows.npy [N, 9504] f32 · mask_labels.npy [N, 288] bool
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use cgm_prep::{preprocess, PipelineConfig};
//! use std::path::Path;
//!
//! // 1. Union the standardized per-study exports.
//! let cfg = PipelineConfig::default();
//! let (rows, _) = cgm_prep::combine::combine_dir(Path::new("data/processed/cgm"), &cfg).unwrap();
//!
//! // 2. Run the rest of the pipeline in memory.
//! let out = preprocess(rows, &cfg).unwrap();
//! println!(
//!     "{} masked examples, scaler range [{}, {}]",
//!     out.masked.nrows(),
//!     out.transform.min,
//!     out.transform.max
//! );
//! ```
//!
//! ## Running individual stages
//!
//! Each stage is also exposed as a standalone function writing/consuming its
//! own artifact (see the `pipeline_steps` binary):
//!
//! ```no_run
//! use cgm_prep::{clean::clean, interpolate::interpolate, dayfilter::filter_days,
//!                normalize::normalize_rows, window::make_windows, PipelineConfig};
//!
//! let cfg = PipelineConfig::default();
//! let rows = cgm_prep::io::read_raw_table("1_combined_cgm.csv".as_ref()).unwrap();
//! let (cleaned, report) = clean(rows);
//! eprintln!("dropped {} unparsable timestamps", report.time_parse_dropped);
//! let (grid, _) = interpolate(&cleaned, &cfg);
//! let (mut days, _) = filter_days(&grid, &cfg);
//! let transform = normalize_rows(&mut days).unwrap();
//! let (windows, _) = make_windows(&days, &cfg);
//! ```

pub mod clean;
pub mod combine;
pub mod config;
pub mod dayfilter;
pub mod encode;
pub mod interpolate;
pub mod io;
pub mod mask;
pub mod normalize;
pub mod window;

use anyhow::Result;
use chrono::NaiveDateTime;
use ndarray::{concatenate, Array2, Axis};

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `cgm_prep::Foo` without having to know the internal module layout.

// config
pub use config::PipelineConfig;

// clean
pub use clean::{clean, CleanReport, Reading};

// combine
pub use combine::{combine_dir, CombineReport};

// interpolate
pub use interpolate::{interpolate, InterpolateReport};

// dayfilter
pub use dayfilter::{filter_days, DayFilterReport, DayRow};

// normalize
pub use normalize::{normalize_rows, FittedTransform, SENTINEL};

// window
pub use window::{make_windows, Window, WindowReport};

// encode
pub use encode::{positional_encoding, PositionalEncoder};

// mask
pub use mask::MaskBuilder;

// io
pub use io::{read_readings, write_readings, RawRow};

/// Everything the full pipeline produces, plus per-stage exclusion counts.
pub struct PreprocessOutput {
    /// `(n_examples, L·(1+D))` f32: masked glucose block + positional block.
    pub masked: Array2<f32>,
    /// `(n_examples, L)` bool: true where a position was masked.
    pub labels: Array2<bool>,
    /// The unmasked encoded rows — ground truth for loss at masked positions.
    pub unmasked: Array2<f32>,
    /// `(ID, start_time)` per row; separator rows (if enabled) have an empty
    /// ID and no timestamp.
    pub meta: Vec<(String, Option<NaiveDateTime>)>,
    /// The fitted min-max transform, for persistence and inverse-transform.
    pub transform: FittedTransform,
    pub reports: PipelineReports,
}

/// The per-stage operator-facing counts, gathered in one place.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineReports {
    pub clean: CleanReport,
    pub interpolate: InterpolateReport,
    pub dayfilter: DayFilterReport,
    pub window: WindowReport,
}

/// Run the **full preprocessing pipeline** on a combined raw table.
///
/// This is the main entry point for the `cgm-prep` library.  It chains every
/// stage in the exact order used to build the pretraining dataset:
///
/// 1. Clean: round timestamps to the minute, drop unparsable/duplicate rows,
///    coerce glucose, sort by `(ID, time)`.
/// 2. Interpolate each ID onto the 5-minute grid, filling only gaps of at
///    most [`PipelineConfig::max_gap`] slots (PCHIP, no extrapolation).
/// 3. Drop days with fewer than [`PipelineConfig::day_min_count()`]
///    non-missing readings; reindex survivors to exactly 288 slots.
/// 4. Fit the global min-max transform and rescale; missing → `-1`.
///    The fit is a full-data single pass completed before any window is
///    emitted.
/// 5. Slide 288-sample windows at stride 144 over each ID.
/// 6. Append the tiled sinusoidal positional block.
/// 7. Mask each glucose position with probability
///    [`PipelineConfig::mask_prob`] using the seeded RNG.
///
/// The encode/mask stages run over [`PipelineConfig::chunk_rows`]-sized
/// window chunks, matching the artifact-streaming binaries.
///
/// # Errors
///
/// Returns an error on a degenerate normalization fit (empty or zero-range
/// data).  Row-, day- and window-level exclusions never fail the run; they
/// are counted in [`PreprocessOutput::reports`].
pub fn preprocess(rows: Vec<RawRow>, cfg: &PipelineConfig) -> Result<PreprocessOutput> {
    let mut reports = PipelineReports::default();

    // 1. Clean.
    let (cleaned, clean_report) = clean(rows);
    reports.clean = clean_report;

    // 2. Interpolate onto the grid.
    let (grid, interp_report) = interpolate(&cleaned, cfg);
    reports.interpolate = interp_report;

    // 3. Day filter.
    let (mut days, day_report) = filter_days(&grid, cfg);
    reports.dayfilter = day_report;

    // 4. Normalize (global fit barrier before windowing).
    let transform = normalize_rows(&mut days)?;

    // 5. Window.
    let (windows, window_report) = make_windows(&days, cfg);
    reports.window = window_report;

    // 6–7. Encode + mask, chunked.
    let mut encoder = PositionalEncoder::new(cfg);
    let mut masker = MaskBuilder::new(cfg);
    let mut meta = Vec::new();
    let mut unmasked_chunks = Vec::new();
    let mut masked_chunks = Vec::new();
    let mut label_chunks = Vec::new();
    for chunk in windows.chunks(cfg.chunk_rows.max(1)) {
        let (chunk_meta, encoded) = encoder.encode_chunk(chunk);
        let (masked, labels) = masker.mask_chunk(&encoded);
        meta.extend(chunk_meta);
        unmasked_chunks.push(encoded);
        masked_chunks.push(masked);
        label_chunks.push(labels);
    }

    let feature_len = cfg.feature_len();
    let stack2 = |chunks: &[Array2<f32>], ncols: usize| -> Result<Array2<f32>> {
        if chunks.is_empty() {
            return Ok(Array2::zeros((0, ncols)));
        }
        let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    };
    let unmasked = stack2(&unmasked_chunks, feature_len)?;
    let masked = stack2(&masked_chunks, feature_len)?;
    let labels = if label_chunks.is_empty() {
        Array2::from_elem((0, cfg.window_len), false)
    } else {
        let views: Vec<_> = label_chunks.iter().map(|c| c.view()).collect();
        concatenate(Axis(0), &views)?
    };

    Ok(PreprocessOutput {
        masked,
        labels,
        unmasked,
        meta,
        transform,
        reports,
    })
}
