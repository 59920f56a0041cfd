//! Cleaning: timestamp rounding, deduplication, numeric coercion.
//!
//! Matches the pandas cleaning step:
//!   `to_datetime(errors="coerce")` → `dt.round("1min")` →
//!   `drop_duplicates(["ID", "time"])` → `sort_values(["ID", "time"])` →
//!   `to_numeric(glc, errors="coerce")`
//!
//! No row is dropped for missing glucose here; missingness is handled by
//! interpolation and the day filter.

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::io::RawRow;

/// Canonical on-disk timestamp format for every table artifact.
pub const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// One glucose observation.  `glc` is mg/dL; missing is `NAN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: String,
    pub time: NaiveDateTime,
    pub glc: f64,
}

/// Counts surfaced to the operator after cleaning.
///
/// Rows dropped for an unparsable timestamp are counted separately from
/// rows dropped as duplicates — the two must never be conflated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub time_parse_dropped: usize,
    pub duplicate_dropped: usize,
    pub glc_coerced_missing: usize,
}

/// Accepted source timestamp layouts, tried in order.
const TIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a source timestamp, trying each accepted layout.
pub fn parse_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIME_LAYOUTS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Round a timestamp to the nearest minute (ties round up, matching
/// pandas `dt.round("1min")` away-from-zero behaviour at 30 s).
pub fn round_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    let trunc = t.with_second(0).unwrap().with_nanosecond(0).unwrap();
    if t.second() >= 30 {
        trunc + Duration::minutes(1)
    } else {
        trunc
    }
}

/// Clean the combined table: parse + round timestamps, coerce glucose,
/// deduplicate `(ID, time)` keep-first, sort by `(ID, time)`.
pub fn clean(rows: Vec<RawRow>) -> (Vec<Reading>, CleanReport) {
    let mut report = CleanReport {
        rows_in: rows.len(),
        ..CleanReport::default()
    };

    let mut readings: Vec<Reading> = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(time) = parse_time(&row.time) else {
            report.time_parse_dropped += 1;
            continue;
        };
        let glc = match row.glc.trim() {
            "" => f64::NAN,
            s => s.parse::<f64>().unwrap_or_else(|_| {
                report.glc_coerced_missing += 1;
                f64::NAN
            }),
        };
        readings.push(Reading {
            id: row.id,
            time: round_to_minute(time),
            glc,
        });
    }

    // Keep-first dedup requires a stable sort: rows that collide after
    // rounding keep their original file order.
    readings.sort_by(|a, b| a.id.cmp(&b.id).then(a.time.cmp(&b.time)));
    let before = readings.len();
    readings.dedup_by(|b, a| a.id == b.id && a.time == b.time);
    report.duplicate_dropped = before - readings.len();
    report.rows_out = readings.len();

    (readings, report)
}
