mod common;
use common::{d, regular_days};

use cgm_prep::{filter_days, interpolate, PipelineConfig};

#[test]
fn kept_days_are_exactly_288_rows_with_enough_readings() {
    let cfg = PipelineConfig::default();
    let input = regular_days("a_1", d(2020, 1, 1), 3);
    let (grid, _) = interpolate(&input, &cfg);
    let (days, report) = filter_days(&grid, &cfg);
    assert_eq!(report.days_kept, 3);
    assert_eq!(days.len(), 3 * 288);
    for day in days.chunks(288) {
        let non_missing = day.iter().filter(|r| !r.glc.is_nan()).count();
        assert!(non_missing >= 259);
        assert_eq!(day[0].time, common::midnight(day[0].date));
        for pair in day.windows(2) {
            assert_eq!((pair[1].time - pair[0].time).num_minutes(), 5);
        }
    }
}

#[test]
fn partial_trailing_day_is_dropped() {
    let cfg = PipelineConfig::default();
    // Two full days plus 200 readings of a third: the third fails the gate.
    let mut input = regular_days("a_1", d(2020, 1, 1), 3);
    input.truncate(2 * 288 + 200);
    let (grid, _) = interpolate(&input, &cfg);
    let (days, report) = filter_days(&grid, &cfg);
    assert_eq!(report.days_kept, 2);
    assert_eq!(report.days_dropped, 1);
    assert_eq!(days.len(), 2 * 288);
    assert!(days.iter().all(|r| r.date != d(2020, 1, 3)));
}

#[test]
fn a_long_unfilled_gap_can_sink_a_day() {
    let cfg = PipelineConfig::default();
    // Remove 40 consecutive readings (200 min): too long to interpolate,
    // leaving 248 < 259 non-missing slots.
    let mut input = regular_days("a_1", d(2020, 1, 1), 1);
    input.drain(100..140);
    let (grid, _) = interpolate(&input, &cfg);
    let (days, report) = filter_days(&grid, &cfg);
    assert!(days.is_empty());
    assert_eq!(report.days_dropped, 1);
}

#[test]
fn dropped_day_never_contaminates_neighbours() {
    let cfg = PipelineConfig::default();
    let mut input = regular_days("a_1", d(2020, 1, 1), 3);
    // Hollow out the middle day.
    input.drain(288 + 50..288 + 250);
    let (grid, _) = interpolate(&input, &cfg);
    let (days, report) = filter_days(&grid, &cfg);
    assert_eq!(report.days_kept, 2);
    assert_eq!(report.days_dropped, 1);
    // Surviving rows belong only to days 1 and 3.
    assert!(days.iter().all(|r| r.date != d(2020, 1, 2)));
    assert_eq!(days.len(), 2 * 288);
}
