use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{CalendarApi, Event, EventSource, EventTime, UTC};
use crate::error::CalendarError;
use crate::launch::{LaunchDate, LaunchRecord, LaunchSet};

const TIMED_EVENT_LENGTH_MIN: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarOp {
    Delete,
    Insert,
}

/// One calendar call that did not go through.
#[derive(Debug)]
pub struct OpFailure {
    pub op: CalendarOp,
    /// Event id for deletes, event title for inserts.
    pub target: String,
    pub error: CalendarError,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub deleted: usize,
    pub inserted: usize,
    pub failures: Vec<OpFailure>,
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("listing existing events failed: {0}")]
    List(#[source] CalendarError),

    #[error(
        "{} calendar operations failed ({} deleted, {} inserted)",
        .0.failures.len(), .0.deleted, .0.inserted
    )]
    Partial(SyncReport),
}

/// Build the calendar event for one launch.
pub fn event_for(record: &LaunchRecord, source: &EventSource) -> Event {
    let (start, end) = match record.date {
        LaunchDate::Timed(at) => (
            EventTime::at(at),
            EventTime::at(at + Duration::minutes(TIMED_EVENT_LENGTH_MIN)),
        ),
        LaunchDate::AllDay(day) => (
            EventTime::on(day),
            EventTime { time_zone: Some(UTC.into()), ..EventTime::on(day) },
        ),
    };
    Event {
        id: None,
        summary: Some(record.title()),
        start,
        end,
        source: Some(source.clone()),
    }
}

/// Makes one calendar hold exactly the given launches from `now` on.
pub struct Reconciler<'a> {
    api: &'a dyn CalendarApi,
    calendar_id: &'a str,
    source: &'a EventSource,
}

impl<'a> Reconciler<'a> {
    pub fn new(api: &'a dyn CalendarApi, calendar_id: &'a str, source: &'a EventSource) -> Self {
        Reconciler { api, calendar_id, source }
    }

    /// Delete every event starting at or after `now`, then insert one event per launch.
    ///
    /// Deletes run concurrently and are all awaited before the first insert is issued;
    /// inserts then run concurrently. A failed call does not stop the rest of its batch,
    /// but the pass is reported as [`ReconcileError::Partial`] afterwards.
    pub async fn reconcile(
        &self,
        launches: &LaunchSet,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, ReconcileError> {
        let existing = self
            .api
            .list_events(self.calendar_id, now)
            .await
            .map_err(ReconcileError::List)?;

        let mut report = SyncReport::default();

        info!("Clearing {} events from the calendar...", existing.len());
        let ids: Vec<&str> = existing
            .iter()
            .filter_map(|e| {
                if e.id.is_none() {
                    debug!(summary = ?e.summary, "Listed event has no id, skipping");
                }
                e.id.as_deref()
            })
            .collect();

        let pb = progress_bar(ids.len(), "delete");
        let deletes = ids.iter().map(|id| {
            let pb = &pb;
            async move {
                let result = self.api.delete_event(self.calendar_id, id).await;
                pb.inc(1);
                (*id, result)
            }
        });
        for (id, result) in join_all(deletes).await {
            match result {
                Ok(()) => report.deleted += 1,
                Err(error) => {
                    warn!("Failed to delete event {}: {}", id, error);
                    report.failures.push(OpFailure { op: CalendarOp::Delete, target: id.to_string(), error });
                }
            }
        }
        pb.finish_and_clear();

        info!("Cleared events. Adding {} launches to the calendar", launches.len());
        let events: Vec<Event> = launches.iter().map(|r| event_for(r, self.source)).collect();

        let pb = progress_bar(events.len(), "insert");
        let inserts = events.iter().map(|event| {
            let pb = &pb;
            async move {
                debug!("Adding {:?} to the calendar", event.summary);
                let result = self.api.insert_event(self.calendar_id, event).await;
                pb.inc(1);
                (event, result)
            }
        });
        for (event, result) in join_all(inserts).await {
            match result {
                Ok(_) => report.inserted += 1,
                Err(error) => {
                    let title = event.summary.clone().unwrap_or_default();
                    warn!("Failed to add {:?}: {}", title, error);
                    report.failures.push(OpFailure { op: CalendarOp::Insert, target: title, error });
                }
            }
        }
        pb.finish_and_clear();

        info!(deleted = report.deleted, inserted = report.inserted, failed = report.failures.len(), "Calendar synced");
        if report.failures.is_empty() {
            Ok(report)
        } else {
            Err(ReconcileError::Partial(report))
        }
    }
}

fn progress_bar(len: usize, label: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{prefix:>6} [{elapsed_precise}] {bar:40} {pos}/{len}") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_prefix(label);
    pb
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::testing::FakeCalendar;
    use chrono::{NaiveDate, TimeZone};

    const CAL: &str = "launches@group.calendar.google.com";

    fn source() -> EventSource {
        EventSource {
            title: "r/SpaceX Launch Manifest".into(),
            url: "https://www.reddit.com/r/SpaceX/wiki/launches/manifest".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 12, 1, 0, 0, 0).unwrap()
    }

    fn timed(payload: &str, h: u32, m: u32) -> LaunchRecord {
        LaunchRecord {
            date: LaunchDate::Timed(Utc.with_ymd_and_hms(2022, 1, 1, h, m, 0).unwrap()),
            payload: payload.into(),
            vehicle: "Falcon 9".into(),
            customer: "SpaceX".into(),
        }
    }

    fn all_day(payload: &str) -> LaunchRecord {
        LaunchRecord {
            date: LaunchDate::AllDay(NaiveDate::from_ymd_opt(2022, 2, 10).unwrap()),
            payload: payload.into(),
            vehicle: "Starship".into(),
            customer: "NASA".into(),
        }
    }

    fn future_event(title: &str, day: u32) -> Event {
        Event {
            summary: Some(title.into()),
            start: EventTime::on(NaiveDate::from_ymd_opt(2022, 3, day).unwrap()),
            end: EventTime::on(NaiveDate::from_ymd_opt(2022, 3, day).unwrap()),
            ..Default::default()
        }
    }

    fn contents(cal: &FakeCalendar) -> Vec<Event> {
        let mut events: Vec<Event> =
            cal.events().into_iter().map(|e| Event { id: None, ..e }).collect();
        events.sort_by_key(|e| e.summary.clone());
        events
    }

    async fn sync(cal: &FakeCalendar, launches: Vec<LaunchRecord>) -> Result<SyncReport, ReconcileError> {
        let src = source();
        Reconciler::new(cal, CAL, &src).reconcile(&LaunchSet::new(launches), now()).await
    }

    #[test]
    fn timed_event_body() {
        let v = serde_json::to_value(event_for(&timed("Starlink", 14, 30), &source())).unwrap();
        assert_eq!(v["summary"], "Starlink - Falcon 9");
        assert_eq!(v["start"]["dateTime"], "2022-01-01T14:30:00Z");
        assert_eq!(v["start"]["timeZone"], "UTC");
        assert_eq!(v["end"]["dateTime"], "2022-01-01T15:00:00Z");
        assert_eq!(v["end"]["timeZone"], "UTC");
        assert!(v["start"].get("date").is_none());
        assert_eq!(v["source"]["title"], "r/SpaceX Launch Manifest");
        assert!(v.get("id").is_none());
    }

    #[test]
    fn all_day_event_body() {
        let v = serde_json::to_value(event_for(&all_day("Crew-5"), &source())).unwrap();
        assert_eq!(v["summary"], "Crew-5 - Starship");
        assert_eq!(v["start"]["date"], "2022-02-10");
        assert_eq!(v["end"]["date"], "2022-02-10");
        assert_eq!(v["end"]["timeZone"], "UTC");
        assert!(v["start"].get("timeZone").is_none());
        assert!(v["start"].get("dateTime").is_none());
    }

    #[tokio::test]
    async fn replaces_all_future_events() {
        let cal = FakeCalendar::default();
        let old: Vec<String> = (1..=4).map(|d| cal.seed(future_event("stale", d))).collect();

        let report = sync(&cal, vec![timed("Starlink", 14, 30), all_day("Crew-5"), timed("SES", 3, 0)])
            .await
            .unwrap();

        assert_eq!(report.deleted, 4);
        assert_eq!(report.inserted, 3);
        let events = cal.events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| !old.contains(e.id.as_ref().unwrap())));
    }

    #[tokio::test]
    async fn deletes_finish_before_any_insert() {
        let cal = FakeCalendar::default();
        for d in 1..=5 {
            cal.seed(future_event("stale", d));
        }
        sync(&cal, vec![timed("A", 1, 0), timed("B", 2, 0), all_day("C")]).await.unwrap();

        let log = cal.log();
        let last_delete = log.iter().rposition(|l| l.starts_with("delete:")).unwrap();
        let first_insert = log.iter().position(|l| l.starts_with("insert:")).unwrap();
        assert!(last_delete < first_insert, "{:?}", log);
    }

    #[tokio::test]
    async fn past_events_are_left_alone() {
        let cal = FakeCalendar::default();
        let past = cal.seed(Event {
            summary: Some("Demo-2 - Falcon 9".into()),
            start: EventTime::at(Utc.with_ymd_and_hms(2020, 5, 30, 19, 22, 0).unwrap()),
            ..Default::default()
        });
        sync(&cal, vec![all_day("Crew-5")]).await.unwrap();
        let ids: Vec<Option<String>> = cal.events().into_iter().map(|e| e.id).collect();
        assert!(ids.contains(&Some(past)));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn record_order_does_not_matter() {
        let a = timed("A", 10, 0);
        let b = all_day("B");

        let first = FakeCalendar::default();
        sync(&first, vec![a.clone(), b.clone()]).await.unwrap();
        let second = FakeCalendar::default();
        sync(&second, vec![b, a]).await.unwrap();

        assert_eq!(contents(&first), contents(&second));
    }

    #[tokio::test]
    async fn running_twice_converges() {
        let cal = FakeCalendar::default();
        let launches = vec![timed("A", 10, 0), all_day("B")];
        sync(&cal, launches.clone()).await.unwrap();
        let once = contents(&cal);
        let report = sync(&cal, launches).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(contents(&cal), once);
    }

    #[tokio::test]
    async fn empty_set_clears_calendar() {
        let cal = FakeCalendar::default();
        cal.seed(future_event("stale", 1));
        cal.seed(future_event("stale", 2));
        let report = sync(&cal, vec![]).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(report.inserted, 0);
        assert!(cal.events().is_empty());
    }

    #[tokio::test]
    async fn failed_calls_are_reported_after_the_batch() {
        let cal = FakeCalendar::default();
        let stuck = cal.seed(future_event("stale", 1));
        cal.seed(future_event("stale", 2));
        {
            let mut s = cal.state.lock().unwrap();
            s.fail_delete.insert(stuck.clone());
            s.fail_insert.insert("B - Starship".into());
        }

        let err = sync(&cal, vec![timed("A", 10, 0), all_day("B")]).await.unwrap_err();
        let ReconcileError::Partial(report) = err else { panic!("expected partial failure") };
        assert_eq!(report.deleted, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .any(|f| f.op == CalendarOp::Delete && f.target == stuck));
        assert!(report
            .failures
            .iter()
            .any(|f| f.op == CalendarOp::Insert && f.target == "B - Starship"));

        // the undeletable event plus the one insert that went through
        assert_eq!(cal.events().len(), 2);
    }

    #[tokio::test]
    async fn list_failure_stops_before_touching_anything() {
        let cal = FakeCalendar::default();
        cal.seed(future_event("stale", 1));
        cal.state.lock().unwrap().fail_list = true;
        let err = sync(&cal, vec![all_day("B")]).await.unwrap_err();
        assert!(matches!(err, ReconcileError::List(_)));
        assert!(cal.log().is_empty());
    }
}
