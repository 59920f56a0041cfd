use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use cgm_prep::combine::combine_dir;
use cgm_prep::io::{write_npy_bool, write_npy_f32};
use cgm_prep::{preprocess, PipelineConfig};

#[derive(Parser)]
#[command(name = "preproc", about = "CGM masked-pretraining preprocessing pipeline")]
struct Args {
    /// Directory of standardized per-study CSVs (<source>_*.csv)
    #[arg(long)]
    sources: PathBuf,

    /// Output directory for masked_windows.npy / mask_labels.npy / scaler.json
    #[arg(long)]
    out: PathBuf,

    /// Per-position masking probability (default: 0.2)
    #[arg(long, default_value_t = 0.2)]
    mask_prob: f64,

    /// Mask RNG seed (default: 42)
    #[arg(long, default_value_t = 42)]
    mask_seed: u64,

    /// Positional-encoding dimension (default: 32)
    #[arg(long, default_value_t = 32)]
    embed_dim: usize,

    /// Keep windows that span a dropped day instead of rejecting them
    #[arg(long)]
    permissive: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    std::fs::create_dir_all(&args.out)?;

    let cfg = PipelineConfig {
        mask_prob: args.mask_prob,
        mask_seed: args.mask_seed,
        embed_dim: args.embed_dim,
        require_contiguous: !args.permissive,
        ..PipelineConfig::default()
    };

    let (rows, combined) = combine_dir(&args.sources, &cfg)?;
    println!(
        "Combined {} rows from {} source files ({} unit-converted)",
        combined.rows, combined.files, combined.converted_rows
    );

    let out = preprocess(rows, &cfg)?;
    let r = &out.reports;
    println!(
        "clean: {} rows ({} bad timestamps, {} duplicates dropped)",
        r.clean.rows_out, r.clean.time_parse_dropped, r.clean.duplicate_dropped
    );
    println!(
        "interpolate: {} grid rows across {} series ({} slots filled, {} long gaps kept missing)",
        r.interpolate.grid_rows, r.interpolate.series, r.interpolate.filled, r.interpolate.long_gaps
    );
    println!(
        "dayfilter: {} days kept, {} dropped",
        r.dayfilter.days_kept, r.dayfilter.days_dropped
    );
    println!(
        "window: {} windows ({} short IDs skipped, {} discontinuous rejected)",
        r.window.windows, r.window.short_ids, r.window.discontinuous_rejected
    );
    println!(
        "scaler: min={} max={}",
        out.transform.min, out.transform.max
    );

    write_npy_f32(&args.out.join("masked_windows.npy"), &out.masked)?;
    write_npy_bool(&args.out.join("mask_labels.npy"), &out.labels)?;
    out.transform.save(&args.out.join("scaler.json"))?;
    std::fs::write(
        args.out.join("pipeline_config.json"),
        serde_json::to_string_pretty(&cfg)?,
    )?;

    println!(
        "Written {} masked examples → {}",
        out.masked.nrows(),
        args.out.display()
    );
    Ok(())
}
