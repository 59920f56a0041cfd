//! Global min-max normalization with an explicit fitted transform.
//!
//! The transform is fit **once** over every non-missing glucose value across
//! all IDs and days, then applied once — a single consistent scale so model
//! outputs can be inverse-transformed later.  After scaling, missing values
//! become the sentinel `-1.0`, which sits outside the normalized range
//! `[0, 1]` so missingness and masking stay unambiguous downstream.
//!
//! A fit over empty or zero-range data is a fatal configuration error, not
//! something to paper over.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dayfilter::DayRow;

/// Out-of-range value denoting "missing" or "masked".
pub const SENTINEL: f64 = -1.0;

/// The persisted min-max scaling transform.
///
/// `normalized = (raw - min) / (max - min)`; no clipping is applied, values
/// are trusted to lie within the fit range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    pub min: f64,
    pub max: f64,
}

impl FittedTransform {
    /// Fit over all non-missing values.
    ///
    /// # Errors
    ///
    /// Fails on an empty input or a degenerate all-equal input (zero range
    /// would divide by zero).
    pub fn fit(values: impl IntoIterator<Item = f64>) -> Result<Self> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut n = 0usize;
        for v in values {
            if v.is_nan() {
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            n += 1;
        }
        if n == 0 {
            bail!("normalization fit over zero non-missing values");
        }
        if max == min {
            bail!("degenerate normalization fit: all {n} values equal {min}");
        }
        Ok(Self { min, max })
    }

    /// Scale one value into `[0, 1]`; missing maps to [`SENTINEL`].
    pub fn transform(&self, v: f64) -> f64 {
        if v.is_nan() {
            SENTINEL
        } else {
            (v - self.min) / (self.max - self.min)
        }
    }

    /// Invert [`transform`](Self::transform) for a normalized model output.
    pub fn inverse_transform(&self, v: f64) -> f64 {
        v * (self.max - self.min) + self.min
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Fit over the day-filtered table and apply in place.  Returns the fitted
/// transform for persistence and later inverse-transformation.
pub fn normalize_rows(rows: &mut [DayRow]) -> Result<FittedTransform> {
    let transform = FittedTransform::fit(rows.iter().map(|r| r.glc))?;
    for r in rows.iter_mut() {
        r.glc = transform.transform(r.glc);
    }
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_maps_fit_range_to_unit_interval() {
        let t = FittedTransform::fit([40.0, 400.0, 120.0]).unwrap();
        assert_eq!(t.transform(40.0), 0.0);
        assert_eq!(t.transform(400.0), 1.0);
        approx::assert_abs_diff_eq!(t.transform(220.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn missing_becomes_sentinel() {
        let t = FittedTransform::fit([40.0, 400.0]).unwrap();
        assert_eq!(t.transform(f64::NAN), SENTINEL);
    }

    #[test]
    fn round_trip_within_tolerance() {
        let t = FittedTransform::fit([39.0, 401.0]).unwrap();
        for raw in [39.0, 74.3, 120.0, 250.5, 401.0] {
            approx::assert_abs_diff_eq!(
                t.inverse_transform(t.transform(raw)),
                raw,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn degenerate_fit_is_fatal() {
        assert!(FittedTransform::fit([100.0, 100.0, 100.0]).is_err());
        assert!(FittedTransform::fit([f64::NAN]).is_err());
        assert!(FittedTransform::fit([]).is_err());
    }

    #[test]
    fn nan_values_do_not_affect_fit() {
        let t = FittedTransform::fit([f64::NAN, 50.0, f64::NAN, 150.0]).unwrap();
        assert_eq!(t.min, 50.0);
        assert_eq!(t.max, 150.0);
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        let t = FittedTransform { min: 39.0, max: 401.0 };
        t.save(&path).unwrap();
        assert_eq!(FittedTransform::load(&path).unwrap(), t);
    }
}
