use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::MeetingPattern;
use crate::settings::CalendarConfig;

/// Google Calendar `events.insert` request body.
pub fn event_payload(pattern: &MeetingPattern, timezone: &str) -> Value {
    json!({
        "summary": pattern.summary,
        "location": pattern.location,
        "description": pattern.description,
        "start": {
            "dateTime": pattern.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": timezone,
        },
        "end": {
            "dateTime": pattern.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": timezone,
        },
        "recurrence": [format!("RRULE:{}", pattern.rrule())],
    })
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: Option<String>,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

/// Inserts events with an already-issued OAuth access token.
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    events_url: Url,
    token: String,
}

impl GoogleCalendarClient {
    pub fn new(config: &CalendarConfig) -> Result<Self> {
        let token = config
            .google_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .context("No Google access token (set SCHED2CAL_CALENDAR__GOOGLE_TOKEN)")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(GoogleCalendarClient {
            http,
            events_url: events_url(&config.google_api_base, &config.calendar_id)?,
            token,
        })
    }

    /// Returns the created event's web link, when Google sends one.
    pub async fn insert_event(&self, payload: &Value) -> Result<Option<String>> {
        debug!(url = %self.events_url, "inserting event");
        let created: CreatedEvent = self
            .http
            .post(self.events_url.clone())
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .context("Google Calendar request failed")?
            .error_for_status()
            .context("Google Calendar rejected the event")?
            .json()
            .await
            .context("Unexpected Google Calendar response")?;
        info!(id = ?created.id, "event created");
        Ok(created.html_link)
    }
}

/// `<base>/calendars/<id>/events`, with the id percent-encoded as one segment.
fn events_url(base: &str, calendar_id: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid API base {base:?}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("API base {base:?} cannot take a path"))?
        .pop_if_empty()
        .extend(["calendars", calendar_id, "events"]);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::tests::record;

    #[test]
    fn payload_shape() {
        let config = CalendarConfig::default();
        let p = MeetingPattern::from_record(&record(), &config).unwrap();
        let v = event_payload(&p, &config.timezone);
        assert_eq!(v["summary"], "CSCI 360 - B200 R106 - N02");
        assert_eq!(v["start"]["dateTime"], "2024-09-04T13:00:00");
        assert_eq!(v["end"]["dateTime"], "2024-09-04T14:30:00");
        assert_eq!(v["start"]["timeZone"], "America/Vancouver");
        assert_eq!(
            v["recurrence"][0],
            "RRULE:FREQ=WEEKLY;BYDAY=MO,WE;UNTIL=20241207T075959Z"
        );
    }

    #[test]
    fn client_needs_token() {
        let config = CalendarConfig::default();
        assert!(GoogleCalendarClient::new(&config).is_err());

        let config = CalendarConfig {
            google_token: Some("ya29.token".into()),
            calendar_id: "team@example.com".into(),
            ..CalendarConfig::default()
        };
        let client = GoogleCalendarClient::new(&config).unwrap();
        assert_eq!(
            client.events_url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@example.com/events"
        );
    }

    #[test]
    fn calendar_id_is_one_path_segment() {
        let url = events_url(
            "https://www.googleapis.com/calendar/v3/",
            "en.canadian#holiday@group.v.calendar.google.com",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/en.canadian%23holiday@group.v.calendar.google.com/events"
        );
        assert_eq!(url.fragment(), None);
        assert!(events_url("not a url", "primary").is_err());
    }
}
