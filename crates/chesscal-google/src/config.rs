//! Client secret and Google configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GoogleError, GoogleResult};

/// Google's OAuth authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// OAuth 2.0 client secret for an installed application.
///
/// Users must register their own OAuth client in the Google Cloud Console
/// and download its JSON.
#[derive(Debug, Clone)]
pub struct ClientSecret {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Authorization endpoint.
    pub auth_uri: String,
    /// Token endpoint used for code exchange and refresh.
    pub token_uri: String,
}

/// Structure of Google's client-secret JSON file.
///
/// Supports the Cloud Console format with an "installed" or "web" section,
/// and a flat format with client_id and client_secret at the root.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<NestedSecret>,
    web: Option<NestedSecret>,
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedSecret {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl ClientSecret {
    /// Creates a client secret using Google's default endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: GOOGLE_AUTH_URL.to_string(),
            token_uri: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Builder method to override the token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Loads a client secret from a file.
    ///
    /// A missing file is reported as [`ErrorCode::SecretNotFound`] so callers
    /// can tell it apart from a malformed one.
    ///
    /// [`ErrorCode::SecretNotFound`]: crate::ErrorCode::SecretNotFound
    pub fn from_file(path: impl AsRef<Path>) -> GoogleResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GoogleError::secret_not_found(path));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GoogleError::invalid_secret(format!(
                "failed to read client secret {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses a client secret from JSON.
    pub fn from_json(json: &str) -> GoogleResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            GoogleError::invalid_secret(format!("failed to parse client secret JSON: {}", e))
        })?;

        let secret = if let Some(nested) = file.installed.or(file.web) {
            Self::new(nested.client_id, nested.client_secret)
                .with_endpoints(nested.auth_uri, nested.token_uri)
        } else if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret)
        {
            Self::new(client_id, client_secret).with_endpoints(file.auth_uri, file.token_uri)
        } else {
            return Err(GoogleError::invalid_secret(
                "client secret must contain an 'installed'/'web' section or \
                 'client_id'/'client_secret' at root level",
            ));
        };

        secret.validate()?;
        Ok(secret)
    }

    fn with_endpoints(mut self, auth_uri: Option<String>, token_uri: Option<String>) -> Self {
        if let Some(uri) = auth_uri {
            self.auth_uri = uri;
        }
        if let Some(uri) = token_uri {
            self.token_uri = uri;
        }
        self
    }

    /// Validates that the secret looks like a Google OAuth client.
    pub fn validate(&self) -> GoogleResult<()> {
        if self.client_id.is_empty() {
            return Err(GoogleError::invalid_secret("client_id is required"));
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err(GoogleError::invalid_secret(
                "client_id should end with .apps.googleusercontent.com",
            ));
        }
        if self.client_secret.is_empty() {
            return Err(GoogleError::invalid_secret("client_secret is required"));
        }
        Ok(())
    }
}

/// Configuration for authenticating against Google.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Path to the client-secret JSON.
    pub secret_path: PathBuf,

    /// Path of the credential cache.
    pub token_path: PathBuf,

    /// OAuth scopes to request. A cached credential must cover all of them.
    pub scopes: Vec<String>,

    /// Port for the loopback redirect listener. `0` picks a free port.
    pub loopback_port: u16,

    /// HTTP request timeout.
    pub timeout: Duration,
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Scope needed to insert and list events.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.events";

    /// Default client-secret file name, relative to the working directory.
    pub const DEFAULT_SECRET_PATH: &'static str = "credentials.json";

    /// Default credential cache file name, relative to the working directory.
    pub const DEFAULT_TOKEN_PATH: &'static str = "token.json";

    /// Creates a configuration for the given client-secret path.
    pub fn new(secret_path: impl Into<PathBuf>) -> Self {
        Self {
            secret_path: secret_path.into(),
            token_path: PathBuf::from(Self::DEFAULT_TOKEN_PATH),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            loopback_port: 0,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the credential cache path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the loopback port.
    pub fn with_loopback_port(mut self, port: u16) -> Self {
        self.loopback_port = port;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> GoogleResult<()> {
        if self.scopes.is_empty() {
            return Err(GoogleError::internal("at least one OAuth scope is required"));
        }
        if self.token_path.as_os_str().is_empty() {
            return Err(GoogleError::cache("token path must not be empty"));
        }
        Ok(())
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SECRET_PATH)
    }
}
