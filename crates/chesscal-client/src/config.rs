//! Client configuration.
//!
//! All settings live in an optional `config.toml`, read from `--config` or
//! from `~/.config/chesscal/config.toml` by default. Every value can be
//! omitted; command-line flags take precedence over the file, and the file
//! over built-in defaults.
//!
//! ```toml
//! [auth]
//! cred_path = "/home/me/secrets/credentials.json"
//! token_path = "/home/me/.cache/chesscal/token.json"
//!
//! [calendar]
//! max_results = 20
//!
//! [test_event]
//! summary = "Club night"
//! start = "2024-09-01T18:00:00"
//! end = "2024-09-01T21:00:00"
//!
//! [logging]
//! format = "json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chesscal_core::{CalendarEvent, EventDateTime, TracingOutputFormat};
use chesscal_google::GoogleConfig;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use crate::cli::Cli;
use crate::error::{ClientError, ClientResult};

/// Public calendar of Japan chess events.
pub const JAPAN_CHESS_CALENDAR_ID: &str =
    "07de3fa594f35d7d04199155ec8ca7089e3053f3e2bbd305a51bf8f1cdcee2d9@group.calendar.google.com";

/// Number of upcoming events listed when nothing else is configured.
pub const DEFAULT_MAX_RESULTS: usize = 10;

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the chesscal client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// OAuth settings.
    pub auth: AuthSettings,

    /// Target calendar settings.
    pub calendar: CalendarSettings,

    /// The event inserted on each run.
    pub test_event: TestEventSettings,

    /// Log output settings.
    pub logging: LoggingSettings,
}

/// OAuth settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Path to the client-secret JSON.
    pub cred_path: Option<PathBuf>,

    /// Path of the credential cache.
    pub token_path: Option<PathBuf>,

    /// OAuth scopes to request.
    pub scopes: Option<Vec<String>>,

    /// Port for the loopback redirect listener.
    pub loopback_port: Option<u16>,

    /// HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Target calendar settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// Calendar id.
    pub id: Option<String>,

    /// Maximum number of upcoming events to list.
    pub max_results: Option<usize>,
}

/// The event inserted on each run.
///
/// `start` and `end` are local date-times in `time_zone`, written as quoted
/// strings (`"2024-08-15T09:00:00"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestEventSettings {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub time_zone: String,
    pub color_id: String,
}

impl Default for TestEventSettings {
    fn default() -> Self {
        let day = NaiveDate::from_ymd_opt(2024, 8, 15).unwrap_or_default();
        Self {
            summary: "Test Event".to_string(),
            location: "test location".to_string(),
            description: "test description".to_string(),
            start: day.and_hms_opt(9, 0, 0).unwrap_or_default(),
            end: day.and_hms_opt(18, 0, 0).unwrap_or_default(),
            time_zone: "Asia/Tokyo".to_string(),
            color_id: "2".to_string(),
        }
    }
}

impl TestEventSettings {
    /// Builds the event payload.
    pub fn to_event(&self) -> CalendarEvent {
        CalendarEvent::new(
            &self.summary,
            EventDateTime::local(self.start, &self.time_zone),
            EventDateTime::local(self.end, &self.time_zone),
        )
        .with_location(&self.location)
        .with_description(&self.description)
        .with_color_id(&self.color_id)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log line format.
    pub format: TracingOutputFormat,
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!("no config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Loads the file named by `--config`, else the default file.
    pub fn for_cli(cli: &Cli) -> ClientResult<Self> {
        match cli.config {
            Some(ref path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chesscal")
    }

    /// Builds the authentication configuration.
    pub fn google_config(&self, cli: &Cli) -> GoogleConfig {
        let secret_path = cli
            .cred_path
            .clone()
            .or_else(|| self.auth.cred_path.clone())
            .unwrap_or_else(|| PathBuf::from(GoogleConfig::DEFAULT_SECRET_PATH));

        let mut config = GoogleConfig::new(secret_path);

        if let Some(path) = cli.token_path.clone().or_else(|| self.auth.token_path.clone()) {
            config = config.with_token_path(path);
        }
        if let Some(ref scopes) = self.auth.scopes {
            config = config.with_scopes(scopes.clone());
        }
        if let Some(port) = self.auth.loopback_port {
            config = config.with_loopback_port(port);
        }
        if let Some(secs) = self.auth.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config
    }

    /// Returns the calendar to insert into and list from.
    pub fn calendar_id(&self, cli: &Cli) -> String {
        cli.calendar_id
            .clone()
            .or_else(|| self.calendar.id.clone())
            .unwrap_or_else(|| JAPAN_CHESS_CALENDAR_ID.to_string())
    }

    /// Returns how many upcoming events to list.
    pub fn max_results(&self, cli: &Cli) -> ClientResult<usize> {
        let max_results = cli
            .max_results
            .or(self.calendar.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            return Err(ClientError::Config(
                "max_results must be at least 1".to_string(),
            ));
        }
        Ok(max_results)
    }
}
