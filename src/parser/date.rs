use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;

use crate::launch::LaunchDate;

// `2022 Jan 1 [14:30]` found anywhere in the cell, loose about spacing and digit counts.
static TIMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})\s+([A-Za-z]{3})\s+(\d{1,2})\s*\[\s*(\d{1,2}):(\d{1,2})\s*\]").unwrap()
});
// `2022 Feb 10` and nothing else.
static DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}) ([A-Za-z]{3}) (\d{1,2})$").unwrap());

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Classify a manifest date cell and parse it.
///
/// A `[` anywhere in the cell marks a timed entry (`YYYY MMM D [HH:mm]`, UTC). The
/// pattern is searched for, so surrounding text such as `NET` is tolerated.
/// Anything else must be exactly `YYYY MMM D` and becomes an all-day entry.
/// Returns `None` for text that fits neither form or names an impossible date.
pub fn parse_launch_date(cell: &str) -> Option<LaunchDate> {
    if cell.contains('[') {
        let caps = TIMED_RE.captures(cell)?;
        let day = ymd(&caps[1], &caps[2], &caps[3])?;
        let time = NaiveTime::from_hms_opt(caps[4].parse().ok()?, caps[5].parse().ok()?, 0)?;
        Some(LaunchDate::Timed(Utc.from_utc_datetime(&day.and_time(time))))
    } else {
        let caps = DAY_RE.captures(cell)?;
        ymd(&caps[1], &caps[2], &caps[3]).map(LaunchDate::AllDay)
    }
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let month = month.to_ascii_lowercase();
    let month = MONTHS.iter().position(|m| *m == month)? as u32 + 1;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)
}

// ── Tests ──
