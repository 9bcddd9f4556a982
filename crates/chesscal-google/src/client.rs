//! Google Calendar API client.
//!
//! A thin HTTP client for the two Calendar v3 calls chesscal makes: inserting
//! an event and listing upcoming events.

use std::time::Duration;

use chesscal_core::CalendarEvent;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::CALENDAR_API_BASE;
use crate::error::{GoogleError, GoogleResult};
use crate::tokens::Credential;

/// Google Calendar API client.
#[derive(Debug)]
pub struct CalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl CalendarClient {
    /// Creates a new client authorized by the given credential.
    pub fn new(credential: &Credential, timeout: Duration) -> GoogleResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("chesscal/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GoogleError::internal(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            access_token: credential.access_token.clone(),
            base_url: CALENDAR_API_BASE.to_string(),
        })
    }

    /// Points the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    /// Inserts an event and returns it as stored by the server.
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> GoogleResult<CalendarEvent> {
        let body = serde_json::to_string(event)
            .map_err(|e| GoogleError::internal(format!("failed to serialize event: {}", e)))?;

        debug!("inserting event into calendar {}", calendar_id);
        let response = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let body = read_success_body(response).await?;
        serde_json::from_str(&body).map_err(|e| {
            GoogleError::invalid_response(format!("failed to parse inserted event: {}", e))
        })
    }

    /// Lists up to `max_results` events starting at or after `time_min`,
    /// ordered by start time. Recurring events are expanded into instances.
    pub async fn list_upcoming(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        max_results: usize,
    ) -> GoogleResult<Vec<CalendarEvent>> {
        debug!(
            "listing up to {} events from calendar {}",
            max_results, calendar_id
        );
        let response = self
            .http_client
            .get(self.events_url(calendar_id))
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Micros, true)),
                ("maxResults", max_results.to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await
            .map_err(map_send_error)?;

        let body = read_success_body(response).await?;
        let list: EventListResponse = serde_json::from_str(&body).map_err(|e| {
            GoogleError::invalid_response(format!("failed to parse response: {}", e))
        })?;

        Ok(list
            .items
            .into_iter()
            .filter(|event| !event.is_cancelled())
            .collect())
    }
}

fn map_send_error(e: reqwest::Error) -> GoogleError {
    if e.is_timeout() {
        GoogleError::network("request timeout")
    } else if e.is_connect() {
        GoogleError::network(format!("connection failed: {}", e))
    } else {
        GoogleError::network(format!("request failed: {}", e))
    }
}

/// Maps API status codes to errors and returns the body of a success response.
async fn read_success_body(response: reqwest::Response) -> GoogleResult<String> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(GoogleError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )));
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(GoogleError::authentication("access token expired or invalid"));
    }

    if status == reqwest::StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(GoogleError::forbidden(format!(
            "access denied to calendar: {}",
            body
        )));
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GoogleError::not_found("calendar not found"));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GoogleError::remote_call(format!(
            "API error ({}): {}",
            status, body
        )));
    }

    response
        .text()
        .await
        .map_err(|e| GoogleError::network(format!("failed to read response: {}", e)))
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}
