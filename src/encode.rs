//! Sinusoidal positional encodings appended to each window.
//!
//! The encoding is the standard transformer table: for position `t` and
//! embedding index pair `(2k, 2k+1)`,
//!
//! ```text
//! pe[t, 2k]   = sin(t · exp(-2k · ln(10000) / D))
//! pe[t, 2k+1] = cos(t · exp(-2k · ln(10000) / D))
//! ```
//!
//! It is a pure function of the position within the window — not of calendar
//! time or glucose — so one `(L, D)` table is computed once and tiled across
//! every window of every ID.
//!
//! Output row layout (fixed, consumed in reverse by the model): the glucose
//! block `glc_0..glc_{L-1}` followed by the per-timestep-flattened positional
//! block `pe_{t}_{d}`, giving `L · (1 + D)` features per row.

use chrono::NaiveDateTime;
use ndarray::Array2;

use crate::config::PipelineConfig;
use crate::normalize::SENTINEL;
use crate::window::Window;

/// Build the `(window_len, embed_dim)` sinusoidal table.
pub fn positional_encoding(window_len: usize, embed_dim: usize) -> Array2<f64> {
    assert!(embed_dim % 2 == 0, "embed_dim must be even, got {embed_dim}");
    let mut pe = Array2::zeros((window_len, embed_dim));
    for k in 0..embed_dim / 2 {
        let div = (-((2 * k) as f64) * (10000.0_f64).ln() / embed_dim as f64).exp();
        for t in 0..window_len {
            let angle = t as f64 * div;
            pe[[t, 2 * k]] = angle.sin();
            pe[[t, 2 * k + 1]] = angle.cos();
        }
    }
    pe
}

/// Stateful encoder: holds the tiled table and tracks the previous window's
/// ID across chunks so optional separator rows land on every ID boundary.
pub struct PositionalEncoder {
    pe_flat: Vec<f32>,
    window_len: usize,
    feature_len: usize,
    separator_rows: bool,
    last_id: Option<String>,
}

impl PositionalEncoder {
    pub fn new(cfg: &PipelineConfig) -> Self {
        let pe = positional_encoding(cfg.window_len, cfg.embed_dim);
        let pe_flat = pe.iter().map(|&v| v as f32).collect();
        Self {
            pe_flat,
            window_len: cfg.window_len,
            feature_len: cfg.feature_len(),
            separator_rows: cfg.id_separator_rows,
            last_id: None,
        }
    }

    /// Encode one chunk of windows into `(meta, rows)`.
    ///
    /// `meta[i]` is the `(ID, start_time)` of `rows[i]`; separator rows (all
    /// sentinel, inserted between IDs when enabled) carry an empty ID and no
    /// timestamp.
    pub fn encode_chunk(&mut self, windows: &[Window]) -> (Vec<(String, Option<NaiveDateTime>)>, Array2<f32>) {
        let mut meta = Vec::with_capacity(windows.len());
        let mut data: Vec<f32> = Vec::with_capacity(windows.len() * self.feature_len);

        for w in windows {
            assert_eq!(
                w.glc.len(),
                self.window_len,
                "window for {} has {} values",
                w.id,
                w.glc.len()
            );
            if self.separator_rows
                && self.last_id.as_deref().is_some_and(|last| last != w.id)
            {
                meta.push((String::new(), None));
                data.extend(std::iter::repeat(SENTINEL as f32).take(self.feature_len));
            }
            meta.push((w.id.clone(), Some(w.start_time)));
            data.extend(w.glc.iter().map(|&v| v as f32));
            data.extend_from_slice(&self.pe_flat);
            self.last_id = Some(w.id.clone());
        }

        let rows = Array2::from_shape_vec((meta.len(), self.feature_len), data)
            .expect("encoded chunk is rectangular by construction");
        (meta, rows)
    }
}
