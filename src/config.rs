//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter for the full preprocessing
//! pipeline.  All fields have sensible defaults that match the values used to
//! build the pretraining dataset.

use serde::{Deserialize, Serialize};

/// Configuration for the full CGM preprocessing pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use cgm_prep::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     mask_prob: 0.15,      // lighter masking
///     embed_dim: 64,        // wider positional encoding
///     ..PipelineConfig::default()
/// };
/// ```
///
/// Or just call [`PipelineConfig::default()`] for the dataset-build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Grid cadence in minutes.
    ///
    /// Every series is resampled onto a grid with this spacing, aligned to
    /// local midnight.  All downstream counts (samples per day, window
    /// length in hours) assume it divides 60.
    ///
    /// Default: `5`.
    pub cadence_min: i64,

    /// Longest run of consecutive missing grid slots that interpolation is
    /// allowed to fill.
    ///
    /// An interior missing run of at most this many slots is filled by
    /// monotone cubic (PCHIP) interpolation; longer runs are left entirely
    /// missing.  At the default cadence this bounds imputation to 20 minutes.
    ///
    /// Default: `4`.
    pub max_gap: usize,

    /// Minimum fraction of a day's slots that must hold a real reading for
    /// the day to survive the day filter.
    ///
    /// At the defaults this is `int(288 * 0.9) = 259` readings; days below
    /// the threshold are dropped outright rather than imputed.
    ///
    /// Default: `0.9`.
    pub day_min_frac: f64,

    /// Window length in grid samples.  288 = 24 h at 5-minute cadence.
    ///
    /// Default: `288`.
    pub window_len: usize,

    /// Offset between consecutive window start positions for the same ID.
    ///
    /// With the default 144 (= `window_len / 2`) consecutive windows overlap
    /// by 50%; the overlap is deliberate augmentation and is never deduped.
    ///
    /// Default: `144`.
    pub stride: usize,

    /// Reject windows whose covered timestamps are not exactly contiguous.
    ///
    /// The windower slides over the concatenation of *surviving* days, which
    /// can be non-contiguous where the day filter dropped a day.  When this
    /// is `true` (the default) a window is emitted only if its last timestamp
    /// is exactly `(window_len - 1) * cadence` after its first, so no window
    /// silently spans a dropped day.  Set to `false` for the permissive
    /// behaviour of the original dataset build.
    pub require_contiguous: bool,

    /// Positional-encoding embedding dimension `D`.  Must be even.
    ///
    /// Each example row carries `window_len * embed_dim` positional features
    /// after its glucose block.
    ///
    /// Default: `32`.
    pub embed_dim: usize,

    /// Insert an all-sentinel (-1) row between windows of different IDs in
    /// the encoded output.
    ///
    /// Only useful when the encoded artifact is consumed without its
    /// `ID`/`start_time` columns; off by default since those are carried
    /// out-of-band.
    pub id_separator_rows: bool,

    /// Per-position masking probability for the pretraining examples.
    ///
    /// Default: `0.2`.
    pub mask_prob: f64,

    /// RNG seed for the mask builder.  Re-running with the same seed and the
    /// same input reproduces the masks bit-for-bit.
    ///
    /// Default: `42`.
    pub mask_seed: u64,

    /// Source prefixes whose exports are in mmol/L and need the ×18
    /// conversion to mg/dL during combining.
    ///
    /// Default: `["dexi", "dexip", "extodedu", "extod101"]`.
    pub mmol_sources: Vec<String>,

    /// Row-chunk size for the stages that stream windows through memory
    /// (encode, mask).
    ///
    /// Default: `1000`.
    pub chunk_rows: usize,
}

impl Default for PipelineConfig {
    /// Returns the dataset-build configuration:
    /// 5-min grid · 20-min max gap · 90% day gate · 288/144 windows ·
    /// D = 32 · p = 0.2.
    fn default() -> Self {
        Self {
            cadence_min: 5,
            max_gap: 4,
            day_min_frac: 0.9,
            window_len: 288,
            stride: 144,
            require_contiguous: true,
            embed_dim: 32,
            id_separator_rows: false,
            mask_prob: 0.2,
            mask_seed: 42,
            mmol_sources: ["dexi", "dexip", "extodedu", "extod101"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chunk_rows: 1000,
        }
    }
}

impl PipelineConfig {
    /// Number of grid samples in one calendar day.
    ///
    /// At the default 5-minute cadence this returns **288**.
    ///
    /// # Examples
    ///
    /// ```
    /// use cgm_prep::PipelineConfig;
    /// let cfg = PipelineConfig::default();
    /// assert_eq!(cfg.samples_per_day(), 288);
    /// ```
    pub fn samples_per_day(&self) -> usize {
        (24 * 60 / self.cadence_min) as usize
    }

    /// Minimum non-missing readings for a day to survive the day filter.
    ///
    /// Computed as `floor(samples_per_day * day_min_frac)`; **259** at the
    /// defaults.
    pub fn day_min_count(&self) -> usize {
        (self.samples_per_day() as f64 * self.day_min_frac) as usize
    }

    /// Total features per encoded example row: the glucose block followed by
    /// the flattened positional block.
    ///
    /// `window_len * (1 + embed_dim)`; **9504** at the defaults.
    pub fn feature_len(&self) -> usize {
        self.window_len * (1 + self.embed_dim)
    }
}
