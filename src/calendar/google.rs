use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::{CalendarApi, Event};
use crate::error::CalendarError;

/// Google Calendar API v3 over plain REST with a bearer token.
pub struct GoogleCalendar {
    client: reqwest::Client,
    base: Url,
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPage {
    #[serde(default)]
    items: Vec<Event>,
    next_page_token: Option<String>,
}

impl GoogleCalendar {
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        access_token: impl Into<String>,
    ) -> Result<Self, CalendarError> {
        let base = Url::parse(api_base).map_err(|e| CalendarError::Url(format!("{}: {}", api_base, e)))?;
        Ok(GoogleCalendar { client, base, access_token: access_token.into() })
    }

    /// `{base}/calendars/{calendar_id}/events[/{event_id}]`, segments percent-encoded.
    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> Result<Url, CalendarError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CalendarError::Url(self.base.to_string()))?;
            segments.pop_if_empty().extend(["calendars", calendar_id, "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CalendarError::Api { status, body })
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        let url = self.events_url(calendar_id, None)?;
        let time_min = time_min.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .bearer_auth(&self.access_token)
                .query(&[
                    ("timeMin", time_min.as_str()),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                ]);
            if let Some(token) = page_token.take() {
                request = request.query(&[("pageToken", token)]);
            }
            let response = request.send().await?;
            let page: EventPage = Self::check(response).await?.json().await?;
            debug!(count = page.items.len(), more = page.next_page_token.is_some(), "Listed events page");
            events.extend(page.items);

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(events)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        let response = self.client.delete(url).bearer_auth(&self.access_token).send().await?;
        if response.status() == StatusCode::GONE {
            debug!("Event {} was already deleted", event_id);
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn insert_event(&self, calendar_id: &str, event: &Event) -> Result<Event, CalendarError> {
        let url = self.events_url(calendar_id, None)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(event)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar() -> GoogleCalendar {
        GoogleCalendar::new(reqwest::Client::new(), "https://www.googleapis.com/calendar/v3/", "tok")
            .unwrap()
    }

    #[test]
    fn events_url_encodes_calendar_id() {
        let url = calendar()
            .events_url("csrgj6c96oqealf0di0jl0km58@group.calendar.google.com", None)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/csrgj6c96oqealf0di0jl0km58@group.calendar.google.com/events"
        );
        let url = calendar().events_url("a/b", Some("ev 1")).unwrap();
        assert_eq!(url.as_str(), "https://www.googleapis.com/calendar/v3/calendars/a%2Fb/events/ev%201");
    }

    #[test]
    fn event_page_parses_api_shape() {
        let json = r#"{
            "kind": "calendar#events",
            "items": [
                {"id": "abc", "summary": "Starlink - Falcon 9", "status": "confirmed",
                 "start": {"dateTime": "2022-01-01T15:30:00+01:00"},
                 "end": {"dateTime": "2022-01-01T16:00:00+01:00", "timeZone": "UTC"}},
                {"id": "def", "start": {"date": "2022-02-10"}, "end": {"date": "2022-02-10"}}
            ],
            "nextPageToken": "p2"
        }"#;
        let page: EventPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));
        assert_eq!(page.items[0].id.as_deref(), Some("abc"));
        assert_eq!(
            page.items[0].start.date_time.unwrap().to_rfc3339(),
            "2022-01-01T14:30:00+00:00"
        );
        assert_eq!(page.items[1].start.date.unwrap().to_string(), "2022-02-10");
    }

    #[test]
    fn bad_base_url_rejected() {
        assert!(GoogleCalendar::new(reqwest::Client::new(), "not a url", "tok").is_err());
    }
}
