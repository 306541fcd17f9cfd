use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// When a launch happens: an exact UTC instant, or just the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchDate {
    Timed(DateTime<Utc>),
    AllDay(NaiveDate),
}

impl LaunchDate {
    pub fn is_all_day(&self) -> bool {
        matches!(self, LaunchDate::AllDay(_))
    }
}

impl std::fmt::Display for LaunchDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchDate::Timed(instant) => write!(f, "{}", instant.format("%Y-%m-%d %H:%M UTC")),
            LaunchDate::AllDay(day) => write!(f, "{}", day.format("%Y-%m-%d")),
        }
    }
}

/// One row of the launch manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StoredLaunch", try_from = "StoredLaunch")]
pub struct LaunchRecord {
    pub date: LaunchDate,
    pub payload: String,
    pub vehicle: String,
    pub customer: String,
}

impl LaunchRecord {
    pub fn all_day(&self) -> bool {
        self.date.is_all_day()
    }

    /// Calendar event title.
    pub fn title(&self) -> String {
        format!("{} - {}", self.payload, self.vehicle)
    }
}

/// Persisted shape: `{date, allDay, payload, customer, vehicle}`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLaunch {
    date: String,
    all_day: bool,
    payload: String,
    customer: String,
    vehicle: String,
}

impl From<LaunchRecord> for StoredLaunch {
    fn from(r: LaunchRecord) -> Self {
        let date = match r.date {
            LaunchDate::Timed(instant) => instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            LaunchDate::AllDay(day) => day.format("%Y-%m-%d").to_string(),
        };
        StoredLaunch {
            date,
            all_day: r.date.is_all_day(),
            payload: r.payload,
            customer: r.customer,
            vehicle: r.vehicle,
        }
    }
}

impl TryFrom<StoredLaunch> for LaunchRecord {
    type Error = String;

    fn try_from(s: StoredLaunch) -> Result<Self, Self::Error> {
        let date = if s.all_day {
            // Older stores wrote all-day dates as midnight timestamps.
            NaiveDate::parse_from_str(&s.date, "%Y-%m-%d")
                .or_else(|_| DateTime::parse_from_rfc3339(&s.date).map(|d| d.naive_utc().date()))
                .map(LaunchDate::AllDay)
        } else {
            DateTime::parse_from_rfc3339(&s.date).map(|d| LaunchDate::Timed(d.with_timezone(&Utc)))
        }
        .map_err(|e| format!("invalid launch date {:?}: {}", s.date, e))?;

        Ok(LaunchRecord {
            date,
            payload: s.payload,
            vehicle: s.vehicle,
            customer: s.customer,
        })
    }
}

/// Ordered result of one extraction pass. Never mutated after it is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchSet(Vec<LaunchRecord>);

impl LaunchSet {
    pub fn new(records: Vec<LaunchRecord>) -> Self {
        LaunchSet(records)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LaunchRecord> {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for LaunchSet {
    type Output = LaunchRecord;

    fn index(&self, i: usize) -> &LaunchRecord {
        &self.0[i]
    }
}

impl<'a> IntoIterator for &'a LaunchSet {
    type Item = &'a LaunchRecord;
    type IntoIter = std::slice::Iter<'a, LaunchRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Tests ──
