pub mod auth;
pub mod google;
pub mod reconcile;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, CalendarError};

pub use auth::GoogleAuthorizer;
pub use google::GoogleCalendar;
pub use reconcile::{ReconcileError, Reconciler, SyncReport};

pub const UTC: &str = "UTC";

/// Start or end of an event: `date` for all-day events, `dateTime` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn at(instant: DateTime<Utc>) -> Self {
        EventTime { date_time: Some(instant), time_zone: Some(UTC.into()), ..Default::default() }
    }

    pub fn on(day: NaiveDate) -> Self {
        EventTime { date: Some(day), ..Default::default() }
    }
}

/// Where an event came from, shown as a link by the calendar UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSource {
    pub title: String,
    pub url: String,
}

/// Calendar event as exchanged with the API. `id` is assigned by the calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,
}

/// The three calendar calls reconciliation needs.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Events starting at or after `time_min`, ordered by start, recurrences expanded.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError>;

    async fn insert_event(&self, calendar_id: &str, event: &Event) -> Result<Event, CalendarError>;
}

/// Hands out an authorized calendar client.
#[async_trait]
pub trait CalendarAuthorizer: Send + Sync {
    async fn authorize(&self) -> Result<Box<dyn CalendarApi>, AuthError>;
}
