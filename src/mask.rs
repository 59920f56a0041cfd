//! Masked-example construction for the imputation pretraining objective.
//!
//! For every encoded window, each of the `L` glucose positions is
//! independently masked with probability `p` (per-position Bernoulli, not
//! span masking).  Masked positions are overwritten with the sentinel `-1`;
//! the positional block is never touched.  The parallel boolean label row
//! marks which positions are training targets.
//!
//! The masked artifact destroys the ground truth at exactly the positions
//! that matter, so the loss must be computed against the *unmasked* encoded
//! artifact, which is always retained alongside.
//!
//! Masking is driven by a seeded [`StdRng`] so a dataset build reproduces
//! bit-for-bit.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::PipelineConfig;
use crate::normalize::SENTINEL;

/// Stateful mask builder; feed it consecutive chunks of encoded rows.
pub struct MaskBuilder {
    rng: StdRng,
    mask_prob: f64,
    window_len: usize,
}

impl MaskBuilder {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(cfg.mask_seed),
            mask_prob: cfg.mask_prob,
            window_len: cfg.window_len,
        }
    }

    /// Mask one chunk of encoded rows.
    ///
    /// Returns `(masked_rows, mask_labels)` where `masked_rows` has the same
    /// shape as the input and `mask_labels` is `(n_rows, window_len)`.
    ///
    /// # Panics
    ///
    /// If a row is narrower than the glucose block — that is an internal
    /// invariant violation, never a skip.
    pub fn mask_chunk(&mut self, rows: &Array2<f32>) -> (Array2<f32>, Array2<bool>) {
        assert!(
            rows.ncols() >= self.window_len,
            "encoded rows have {} features, glucose block alone needs {}",
            rows.ncols(),
            self.window_len
        );
        let mut masked = rows.clone();
        let mut labels = Array2::from_elem((rows.nrows(), self.window_len), false);
        for i in 0..rows.nrows() {
            for t in 0..self.window_len {
                if self.rng.gen::<f64>() < self.mask_prob {
                    masked[[i, t]] = SENTINEL as f32;
                    labels[[i, t]] = true;
                }
            }
        }
        (masked, labels)
    }
}
