//! Day filtering: per-(ID, date) completeness gate + reindex to the full
//! daily grid.
//!
//! A day keeps its data only when at least 90% of its expected slots hold a
//! real reading (259 of 288 at the defaults); anything sparser is dropped
//! outright — dropping a noisy day is preferred over imputing across large
//! gaps.  Surviving days are reindexed onto exactly `samples_per_day` slots
//! starting at local midnight, with unfilled slots left missing.
//!
//! This gate runs before windowing, so a dropped day contributes no samples
//! to any window.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::info;

use crate::clean::Reading;
use crate::config::PipelineConfig;

/// One slot of the day-filtered table.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRow {
    pub id: String,
    pub time: NaiveDateTime,
    pub date: NaiveDate,
    pub glc: f64,
}

/// Counts surfaced to the operator after day filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayFilterReport {
    pub days_kept: usize,
    pub days_dropped: usize,
}

/// Apply the completeness gate and reindex surviving days.
///
/// `readings` must be sorted by `(ID, time)` (the interpolated table is).
pub fn filter_days(readings: &[Reading], cfg: &PipelineConfig) -> (Vec<DayRow>, DayFilterReport) {
    let mut out = Vec::new();
    let mut report = DayFilterReport::default();

    let mut start = 0;
    while start < readings.len() {
        let key = (readings[start].id.as_str(), readings[start].time.date());
        let end = readings[start..]
            .iter()
            .position(|r| (r.id.as_str(), r.time.date()) != key)
            .map_or(readings.len(), |p| start + p);
        emit_day(&readings[start..end], cfg, &mut out, &mut report);
        start = end;
    }

    (out, report)
}

/// Gate + reindex one `(ID, date)` group.
fn emit_day(
    day: &[Reading],
    cfg: &PipelineConfig,
    out: &mut Vec<DayRow>,
    report: &mut DayFilterReport,
) {
    let id = &day[0].id;
    let date = day[0].time.date();

    let non_missing = day.iter().filter(|r| !r.glc.is_nan()).count();
    if non_missing < cfg.day_min_count() {
        info!("skipping day {date} for {id}: {non_missing} readings");
        report.days_dropped += 1;
        return;
    }

    // Reindex onto the complete daily grid; values only land on exact slot
    // timestamps since the interpolated table already sits on the grid.
    let midnight = date.and_hms_opt(0, 0, 0).unwrap();
    let cadence = Duration::minutes(cfg.cadence_min);
    let n = cfg.samples_per_day();
    let mut slots = vec![f64::NAN; n];
    for r in day {
        let offset = (r.time - midnight).num_minutes();
        if offset % cfg.cadence_min == 0 {
            let slot = (offset / cfg.cadence_min) as usize;
            if slot < n {
                slots[slot] = r.glc;
            }
        }
    }

    out.extend(slots.into_iter().enumerate().map(|(i, glc)| DayRow {
        id: id.clone(),
        time: midnight + cadence * i as i32,
        date,
        glc,
    }));
    report.days_kept += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cfg() -> PipelineConfig {
        PipelineConfig::default()
    }

    /// One day on the 5-min grid with `n` non-missing readings starting at
    /// `start_slot`.
    fn day(id: &str, date: NaiveDate, start_slot: usize, n: usize) -> Vec<Reading> {
        let midnight = date.and_hms_opt(0, 0, 0).unwrap();
        (start_slot..start_slot + n)
            .map(|slot| Reading {
                id: id.into(),
                time: midnight + Duration::minutes(5 * slot as i64),
                glc: 100.0 + slot as f64,
            })
            .collect()
    }

    #[test]
    fn sparse_day_is_dropped_entirely() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let (out, report) = filter_days(&day("a_1", d, 0, 258), &cfg());
        assert!(out.is_empty());
        assert_eq!(report.days_dropped, 1);
        assert_eq!(report.days_kept, 0);
    }

    #[test]
    fn kept_day_has_exactly_288_slots_from_midnight() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        // 260 readings starting at slot 10: passes the 259 gate.
        let (out, report) = filter_days(&day("a_1", d, 10, 260), &cfg());
        assert_eq!(report.days_kept, 1);
        assert_eq!(out.len(), 288);
        assert_eq!(out[0].time, d.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(out[287].time, d.and_hms_opt(23, 55, 0).unwrap());
        for w in out.windows(2) {
            assert_eq!((w[1].time - w[0].time).num_minutes(), 5);
        }
        // Slots before the first reading stay missing.
        assert!(out[9].glc.is_nan());
        assert_eq!(out[10].glc, 110.0);
    }

    #[test]
    fn threshold_is_exactly_259() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let (out, _) = filter_days(&day("a_1", d, 0, 259), &cfg());
        assert_eq!(out.len(), 288);
    }

    #[test]
    fn days_are_gated_independently_per_id_and_date() {
        let d1 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let mut rows = day("a_1", d1, 0, 288);
        rows.extend(day("a_1", d2, 0, 100)); // dropped
        rows.extend(day("b_1", d1, 0, 288));
        let (out, report) = filter_days(&rows, &cfg());
        assert_eq!(report.days_kept, 2);
        assert_eq!(report.days_dropped, 1);
        assert_eq!(out.len(), 2 * 288);
        assert!(out.iter().all(|r| r.date != d2));
    }
}
