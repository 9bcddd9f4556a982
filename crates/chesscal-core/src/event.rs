//! Calendar event types.
//!
//! This module provides the event model shared by the Google client and the
//! CLI:
//! - [`CalendarEvent`]: a flat event record in Calendar v3 JSON shape
//! - [`EventDateTime`]: the start or end of an event, either a date-time or an
//!   all-day date

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Format used for date-times that carry a separate IANA time zone.
const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The start or end of a calendar event.
///
/// Google accepts a local date-time paired with a `timeZone`, and returns
/// RFC 3339 date-times with an offset. The date-time is therefore kept in its
/// wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// Date-time, either local (`2024-08-15T09:00:00`) or RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,

    /// Date for all-day events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    /// IANA time zone name, e.g. `Asia/Tokyo`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// Creates a local date-time interpreted in the given time zone.
    pub fn local(date_time: NaiveDateTime, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.format(LOCAL_DATETIME_FORMAT).to_string()),
            date: None,
            time_zone: Some(time_zone.into()),
        }
    }

    /// Creates an absolute UTC date-time.
    pub fn utc(date_time: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(date_time.to_rfc3339_opts(SecondsFormat::Secs, true)),
            date: None,
            time_zone: None,
        }
    }

    /// Creates an all-day date.
    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date_time: None,
            date: Some(date),
            time_zone: None,
        }
    }

    /// Returns true if this is an all-day date.
    pub fn is_all_day(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }

    /// Returns the display form: the date-time if present, else the date.
    pub fn display(&self) -> String {
        match (&self.date_time, &self.date) {
            (Some(dt), _) => dt.clone(),
            (None, Some(date)) => date.format("%Y-%m-%d").to_string(),
            (None, None) => String::new(),
        }
    }
}

/// A calendar event as exchanged with the Calendar v3 API.
///
/// Server-assigned fields (`id`, `status`, `html_link`) are `None` on events
/// built locally for insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub start: EventDateTime,

    #[serde(default)]
    pub end: EventDateTime,

    /// Event color, an index into the calendar's color palette ("1".."11").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

impl CalendarEvent {
    /// Creates an event with a summary and time range.
    pub fn new(summary: impl Into<String>, start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            summary: Some(summary.into()),
            start,
            end,
            ..Default::default()
        }
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the color id.
    pub fn with_color_id(mut self, color_id: impl Into<String>) -> Self {
        self.color_id = Some(color_id.into());
        self
    }

    /// Returns true if the server reports this event as cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Returns the summary, or a placeholder for untitled events.
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or("(no title)")
    }

    /// Formats the event as a single listing line: `<start> <summary>`.
    pub fn listing_line(&self) -> String {
        format!("{} {}", self.start.display(), self.title())
    }
}
