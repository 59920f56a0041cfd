//! Sliding-window extraction.
//!
//! Slides a fixed-length window (default 288 samples = 24 h) with a fixed
//! stride (default 144 = 50% overlap) over each ID's day-validated series.
//! The overlap between consecutive windows is deliberate augmentation and is
//! never deduped.  An ID shorter than one window contributes nothing — a
//! documented exclusion, not an error.

use chrono::{Duration, NaiveDateTime};
use log::info;

use crate::config::PipelineConfig;
use crate::dayfilter::DayRow;

/// One fixed-length training example slice: `(id, start_time)` plus exactly
/// `window_len` normalized glucose values (or -1 sentinels).
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub id: String,
    pub start_time: NaiveDateTime,
    pub glc: Vec<f64>,
}

/// Counts surfaced to the operator after windowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowReport {
    pub windows: usize,
    /// IDs skipped because their whole series is shorter than one window.
    pub short_ids: usize,
    /// Start offsets rejected because the covered timestamps straddle a
    /// dropped day (only with `require_contiguous`).
    pub discontinuous_rejected: usize,
}

/// Slide windows over every ID in the normalized, day-filtered table.
///
/// `rows` must be grouped by ID with each ID's surviving days in time order
/// (the day-filtered artifact is).
pub fn make_windows(rows: &[DayRow], cfg: &PipelineConfig) -> (Vec<Window>, WindowReport) {
    let mut out = Vec::new();
    let mut report = WindowReport::default();
    let mut start = 0;
    while start < rows.len() {
        let id = &rows[start].id;
        let end = rows[start..]
            .iter()
            .position(|r| &r.id != id)
            .map_or(rows.len(), |p| start + p);
        windows_for_series(&rows[start..end], cfg, &mut out, &mut report);
        start = end;
    }
    (out, report)
}

/// Slide windows over one ID's series, appending to `out`.
pub fn windows_for_series(
    series: &[DayRow],
    cfg: &PipelineConfig,
    out: &mut Vec<Window>,
    report: &mut WindowReport,
) {
    let len = series.len();
    let l = cfg.window_len;
    if len < l {
        info!("skipping ID {} with only {len} points", series[0].id);
        report.short_ids += 1;
        return;
    }

    // Start/end of a contiguous window are exactly (L-1) cadences apart.
    let full_span = Duration::minutes(cfg.cadence_min * (l as i64 - 1));

    let mut i = 0;
    while i + l <= len {
        let slice = &series[i..i + l];
        if cfg.require_contiguous && slice[l - 1].time - slice[0].time != full_span {
            report.discontinuous_rejected += 1;
        } else {
            out.push(Window {
                id: slice[0].id.clone(),
                start_time: slice[0].time,
                glc: slice.iter().map(|r| r.glc).collect(),
            });
            report.windows += 1;
        }
        i += cfg.stride;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cfg() -> PipelineConfig {
        PipelineConfig::default()
    }

    /// `n_days` contiguous day-filtered days for one ID, values = slot index.
    fn days(id: &str, first: NaiveDate, n_days: usize) -> Vec<DayRow> {
        let mut rows = Vec::new();
        for d in 0..n_days {
            let date = first + Duration::days(d as i64);
            let midnight = date.and_hms_opt(0, 0, 0).unwrap();
            for slot in 0..288usize {
                rows.push(DayRow {
                    id: id.into(),
                    time: midnight + Duration::minutes(5 * slot as i64),
                    date,
                    glc: (d * 288 + slot) as f64,
                });
            }
        }
        rows
    }

    #[test]
    fn ten_regular_days_give_nineteen_windows() {
        let rows = days("a_1", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 10);
        let (windows, report) = make_windows(&rows, &cfg());
        // floor((2880 - 288) / 144) + 1 = 19
        assert_eq!(windows.len(), 19);
        assert_eq!(report.windows, 19);
        assert_eq!(report.discontinuous_rejected, 0);
    }

    #[test]
    fn every_window_has_exactly_window_len_values() {
        let rows = days("a_1", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 3);
        let (windows, _) = make_windows(&rows, &cfg());
        for w in &windows {
            assert_eq!(w.glc.len(), 288);
        }
    }

    #[test]
    fn consecutive_windows_overlap_by_half() {
        let rows = days("a_1", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 4);
        let (windows, _) = make_windows(&rows, &cfg());
        for pair in windows.windows(2) {
            assert_eq!(pair[0].glc[144..], pair[1].glc[..144]);
            assert_eq!(
                (pair[1].start_time - pair[0].start_time).num_minutes(),
                144 * 5
            );
        }
    }

    #[test]
    fn short_series_contributes_nothing() {
        let mut rows = days("a_1", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 1);
        rows.truncate(287);
        let (windows, report) = make_windows(&rows, &cfg());
        assert!(windows.is_empty());
        assert_eq!(report.short_ids, 1);
    }

    #[test]
    fn windows_spanning_a_dropped_day_are_rejected() {
        // Day 1 and day 3 survive, day 2 was dropped: offsets that straddle
        // the hole must not produce a window.
        let first = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut rows = days("a_1", first, 1);
        rows.extend(days("a_1", first + Duration::days(2), 1));
        let (windows, report) = make_windows(&rows, &cfg());
        // Offsets 0 and 288 are contiguous whole days; offset 144 straddles.
        assert_eq!(windows.len(), 2);
        assert_eq!(report.discontinuous_rejected, 1);
        for w in &windows {
            assert_eq!(w.start_time.time(), chrono::NaiveTime::MIN);
        }
    }

    #[test]
    fn permissive_mode_keeps_cross_gap_windows() {
        let first = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut rows = days("a_1", first, 1);
        rows.extend(days("a_1", first + Duration::days(2), 1));
        let cfg = PipelineConfig {
            require_contiguous: false,
            ..cfg()
        };
        let (windows, report) = make_windows(&rows, &cfg);
        assert_eq!(windows.len(), 3); // floor((576-288)/144)+1
        assert_eq!(report.discontinuous_rejected, 0);
    }
}
