mod common;
use common::{d, regular_days};

use cgm_prep::{filter_days, interpolate, make_windows, normalize_rows, PipelineConfig};

/// Run a per-ID reading series through interpolate → dayfilter → normalize,
/// returning the windower input.
fn to_day_rows(input: Vec<cgm_prep::Reading>, cfg: &PipelineConfig) -> Vec<cgm_prep::DayRow> {
    let (grid, _) = interpolate(&input, cfg);
    let (mut days, _) = filter_days(&grid, cfg);
    normalize_rows(&mut days).unwrap();
    days
}

#[test]
fn ten_perfect_days_give_nineteen_windows() {
    let cfg = PipelineConfig::default();
    let days = to_day_rows(regular_days("a_1", d(2020, 1, 1), 10), &cfg);
    assert_eq!(days.len(), 2880);
    let (windows, report) = make_windows(&days, &cfg);
    // floor((2880 - 288) / 144) + 1 = 19
    assert_eq!(windows.len(), 19);
    assert_eq!(report.short_ids, 0);
    assert_eq!(report.discontinuous_rejected, 0);
}

#[test]
fn overlap_halves_match_exactly() {
    let cfg = PipelineConfig::default();
    let days = to_day_rows(regular_days("a_1", d(2020, 1, 1), 4), &cfg);
    let (windows, _) = make_windows(&days, &cfg);
    for pair in windows.windows(2) {
        assert_eq!(pair[0].glc[144..], pair[1].glc[..144]);
    }
}

#[test]
fn window_values_are_normalized_or_sentinel() {
    let cfg = PipelineConfig::default();
    let days = to_day_rows(regular_days("a_1", d(2020, 1, 1), 2), &cfg);
    let (windows, _) = make_windows(&days, &cfg);
    for w in &windows {
        assert_eq!(w.glc.len(), 288);
        for &v in &w.glc {
            assert!((0.0..=1.0).contains(&v) || v == -1.0, "value {v}");
        }
    }
}

#[test]
fn one_day_id_yields_exactly_one_window() {
    let cfg = PipelineConfig::default();
    let mut input = regular_days("a_1", d(2020, 1, 1), 10);
    input.extend(regular_days("b_1", d(2020, 1, 1), 1)); // 288 = exactly one
    let days = to_day_rows(input, &cfg);
    let (windows, report) = make_windows(&days, &cfg);
    assert_eq!(windows.iter().filter(|w| w.id == "b_1").count(), 1);
    assert_eq!(windows.len(), 20);
    assert_eq!(report.short_ids, 0);
}

#[test]
fn no_window_spans_a_dropped_day() {
    let cfg = PipelineConfig::default();
    // Middle day hollowed out: it is dropped, so no emitted window may
    // include any of its slots or straddle the hole.
    let mut input = regular_days("a_1", d(2020, 1, 1), 5);
    input.drain(2 * 288 + 10..2 * 288 + 270);
    let days = to_day_rows(input, &cfg);
    assert_eq!(days.len(), 4 * 288);
    let (windows, report) = make_windows(&days, &cfg);
    assert!(report.discontinuous_rejected > 0);
    let span = chrono::Duration::minutes(5 * 287);
    for w in &windows {
        // Neither end of an emitted window may touch the dropped day.
        assert_ne!(w.start_time.date(), d(2020, 1, 3));
        assert_ne!((w.start_time + span).date(), d(2020, 1, 3));
    }
}
