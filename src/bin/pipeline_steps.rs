/// pipeline_steps: run every preprocessing stage in sequence, writing each
/// intermediate artifact so other tooling (and the pandas reference) can be
/// compared stage by stage.
///
/// Output files (under --out):
///   1_combined_cgm.csv           ID,time,glc         raw union
///   2_cleaned_cgm.csv            ID,time,glc         deduplicated/sorted
///   3_interpolated_cgm.csv       ID,time,glc         5-min grid, 1 d.p.
///   4_resampled_cgm.csv          ID,time,date,glc    288 rows per kept day
///   5_normalized_cgm.csv         ID,time,date,glc    [0,1] or -1
///   6_cgm_windows.csv            ID,start_time,glc_0..glc_287
///   7_cgm_windows_with_pe.csv    + pe_{t}_{d} columns
///   masked_windows.npy           [N, 9504] f32
///   mask_labels.npy              [N, 288]  bool
///   scaler.json                  fitted (min, max)
///   pipeline_config.json         the settings used for this run
use anyhow::Result;
use clap::Parser;
use ndarray::{concatenate, Axis};
use std::path::PathBuf;

use cgm_prep::combine::combine_dir;
use cgm_prep::io::{
    write_day_rows, write_npy_bool, write_npy_f32, write_raw_table, write_readings,
    EncodedWriter, WindowWriter,
};
use cgm_prep::{
    clean::clean, dayfilter::filter_days, interpolate::interpolate, normalize::normalize_rows,
    window::make_windows, MaskBuilder, PipelineConfig, PositionalEncoder,
};

#[derive(Parser, Debug)]
#[command(name = "pipeline_steps")]
struct Args {
    /// Directory of standardized per-study CSVs.
    #[arg(long)]
    sources: PathBuf,

    /// Output directory for all artifacts.
    #[arg(long)]
    out: PathBuf,

    /// Per-position masking probability.
    #[arg(long, default_value_t = 0.2_f64)]
    mask_prob: f64,

    /// Mask RNG seed.
    #[arg(long, default_value_t = 42_u64)]
    mask_seed: u64,

    /// Row-chunk size for the encode/mask stages.
    #[arg(long, default_value_t = 1000_usize)]
    chunk_rows: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    std::fs::create_dir_all(&args.out)?;

    let cfg = PipelineConfig {
        mask_prob: args.mask_prob,
        mask_seed: args.mask_seed,
        chunk_rows: args.chunk_rows,
        ..PipelineConfig::default()
    };

    // ── 1. Combine ─────────────────────────────────────────────────────────
    let t_comb = now();
    let (raw_rows, comb_report) = combine_dir(&args.sources, &cfg)?;
    write_raw_table(&args.out.join("1_combined_cgm.csv"), &raw_rows)?;
    let ms_comb = t_comb.elapsed().as_secs_f64() * 1000.0;

    // ── 2. Clean ───────────────────────────────────────────────────────────
    let t_clean = now();
    let (cleaned, clean_report) = clean(raw_rows);
    write_readings(&args.out.join("2_cleaned_cgm.csv"), &cleaned)?;
    let ms_clean = t_clean.elapsed().as_secs_f64() * 1000.0;

    // ── 3. Interpolate ─────────────────────────────────────────────────────
    let t_interp = now();
    let (grid, interp_report) = interpolate(&cleaned, &cfg);
    write_readings(&args.out.join("3_interpolated_cgm.csv"), &grid)?;
    let ms_interp = t_interp.elapsed().as_secs_f64() * 1000.0;

    // ── 4. Day filter ──────────────────────────────────────────────────────
    let t_days = now();
    let (mut days, day_report) = filter_days(&grid, &cfg);
    write_day_rows(&args.out.join("4_resampled_cgm.csv"), &days)?;
    let ms_days = t_days.elapsed().as_secs_f64() * 1000.0;

    // ── 5. Normalize (fit barrier: full pass before any window) ────────────
    let t_norm = now();
    let transform = normalize_rows(&mut days)?;
    write_day_rows(&args.out.join("5_normalized_cgm.csv"), &days)?;
    transform.save(&args.out.join("scaler.json"))?;
    let ms_norm = t_norm.elapsed().as_secs_f64() * 1000.0;

    // ── 6. Window ──────────────────────────────────────────────────────────
    let t_win = now();
    let (windows, win_report) = make_windows(&days, &cfg);
    let mut ww = WindowWriter::create(&args.out.join("6_cgm_windows.csv"), cfg.window_len)?;
    for w in &windows {
        ww.write(w)?;
    }
    ww.finish()?;
    let ms_win = t_win.elapsed().as_secs_f64() * 1000.0;

    // ── 7–8. Encode + mask, chunked, appending incrementally ───────────────
    let t_enc = now();
    let mut encoder = PositionalEncoder::new(&cfg);
    let mut masker = MaskBuilder::new(&cfg);
    let mut ew = EncodedWriter::create(
        &args.out.join("7_cgm_windows_with_pe.csv"),
        cfg.window_len,
        cfg.embed_dim,
    )?;
    let mut masked_chunks = Vec::new();
    let mut label_chunks = Vec::new();
    for chunk in windows.chunks(cfg.chunk_rows.max(1)) {
        let (meta, encoded) = encoder.encode_chunk(chunk);
        ew.write_chunk(&meta, &encoded)?;
        let (masked, labels) = masker.mask_chunk(&encoded);
        masked_chunks.push(masked);
        label_chunks.push(labels);
    }
    ew.finish()?;
    let ms_enc = t_enc.elapsed().as_secs_f64() * 1000.0;

    let t_mask = now();
    if !masked_chunks.is_empty() {
        let views: Vec<_> = masked_chunks.iter().map(|c| c.view()).collect();
        write_npy_f32(&args.out.join("masked_windows.npy"), &concatenate(Axis(0), &views)?)?;
        let views: Vec<_> = label_chunks.iter().map(|c| c.view()).collect();
        write_npy_bool(&args.out.join("mask_labels.npy"), &concatenate(Axis(0), &views)?)?;
    }
    let ms_mask = t_mask.elapsed().as_secs_f64() * 1000.0;

    std::fs::write(
        args.out.join("pipeline_config.json"),
        serde_json::to_string_pretty(&cfg)?,
    )?;

    // Print internal step timings to stderr (parsed by compare tooling).
    eprintln!(
        "TIMING combine={ms_comb:.4}ms clean={ms_clean:.4}ms interpolate={ms_interp:.4}ms \
         dayfilter={ms_days:.4}ms normalize={ms_norm:.4}ms window={ms_win:.4}ms \
         encode={ms_enc:.4}ms mask={ms_mask:.4}ms",
    );
    eprintln!(
        "  {} sources  {} cleaned rows  {} grid rows  {} days kept ({} dropped)  \
         {} windows ({} short IDs, {} discontinuous)",
        comb_report.files,
        clean_report.rows_out,
        interp_report.grid_rows,
        day_report.days_kept,
        day_report.days_dropped,
        win_report.windows,
        win_report.short_ids,
        win_report.discontinuous_rejected,
    );

    eprintln!("Done → {}", args.out.display());
    Ok(())
}

/// Return `std::time::Instant::now()` (used for internal timing).
#[inline(always)]
fn now() -> std::time::Instant {
    std::time::Instant::now()
}
