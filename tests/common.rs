/// Shared synthetic-series builders for the integration tests.
use chrono::{Duration, NaiveDate, NaiveDateTime};

use cgm_prep::io::RawRow;
use cgm_prep::Reading;

#[allow(unused)]
pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[allow(unused)]
pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap()
}

/// A smooth, plausibly glycemic value for a global slot index: oscillates in
/// roughly 80–180 mg/dL with both fast and slow components.
#[allow(unused)]
pub fn glc_wave(slot: usize) -> f64 {
    let x = slot as f64;
    130.0 + 40.0 * (x / 37.0).sin() + 10.0 * (x / 7.0).cos()
}

#[allow(unused)]
/// `n_days` of perfectly regular 5-minute readings for one ID, starting at
/// midnight of `first`.
pub fn regular_days(id: &str, first: NaiveDate, n_days: usize) -> Vec<Reading> {
    let start = midnight(first);
    (0..n_days * 288)
        .map(|slot| Reading {
            id: id.into(),
            time: start + Duration::minutes(5 * slot as i64),
            glc: glc_wave(slot),
        })
        .collect()
}

#[allow(unused)]
/// The same series as raw (pre-clean) rows, timestamps rendered as text.
pub fn regular_days_raw(id: &str, first: NaiveDate, n_days: usize) -> Vec<RawRow> {
    regular_days(id, first, n_days)
        .into_iter()
        .map(|r| RawRow {
            id: r.id,
            time: r.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            glc: format!("{}", r.glc),
        })
        .collect()
}
