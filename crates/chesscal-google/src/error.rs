//! Error types for Google authentication and Calendar API calls.
//!
//! Errors fall into two classes, reported by [`ErrorCode::is_auth_class`]:
//! failures to obtain a credential, and failures of remote calls made with one.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// The category of a [`GoogleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The client-secret file does not exist.
    SecretNotFound,
    /// The client-secret file could not be read or parsed.
    InvalidSecret,
    /// The interactive authorization flow failed or was denied.
    AuthorizationFailed,
    /// The refresh exchange was rejected (e.g. revoked grant).
    RefreshFailed,
    /// The API rejected the access token (401).
    AuthenticationFailed,
    /// The credential lacks access to the calendar (403).
    Forbidden,
    /// The requested calendar or event does not exist (404).
    NotFound,
    /// Too many requests (429).
    RateLimited,
    /// Any other non-success API response.
    RemoteCall,
    /// Connection failed, timeout, DNS resolution, etc.
    Network,
    /// The server answered with a body we could not decode.
    InvalidResponse,
    /// Reading or writing the credential cache failed.
    Cache,
    /// Unexpected internal state.
    Internal,
}

impl ErrorCode {
    /// Returns true if this error happened while obtaining a credential.
    pub fn is_auth_class(&self) -> bool {
        matches!(
            self,
            Self::SecretNotFound
                | Self::InvalidSecret
                | Self::AuthorizationFailed
                | Self::RefreshFailed
                | Self::Cache
        )
    }

    /// Returns a stable snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecretNotFound => "secret_not_found",
            Self::InvalidSecret => "invalid_secret",
            Self::AuthorizationFailed => "authorization_failed",
            Self::RefreshFailed => "refresh_failed",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::RemoteCall => "remote_call_failed",
            Self::Network => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::Cache => "cache_error",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while authenticating or calling the Calendar API.
#[derive(Debug, Error)]
pub struct GoogleError {
    code: ErrorCode,
    message: String,
    /// User guidance printed alongside the error.
    hint: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GoogleError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
            source: None,
        }
    }

    /// Creates a missing client-secret error.
    pub fn secret_not_found(path: &Path) -> Self {
        Self::new(
            ErrorCode::SecretNotFound,
            format!("client secret file not found: {}", path.display()),
        )
        .with_hint(
            "download the OAuth client JSON from the Google Cloud Console \
             and pass it with --cred-path",
        )
    }

    /// Creates an invalid client-secret error.
    pub fn invalid_secret(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidSecret, message)
    }

    /// Creates an authorization flow error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthorizationFailed, message)
    }

    /// Creates a refresh error.
    pub fn refresh(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RefreshFailed, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthenticationFailed, message)
    }

    /// Creates a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    /// Creates a remote call error.
    pub fn remote_call(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RemoteCall, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidResponse, message)
    }

    /// Creates a credential cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cache, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Attaches user guidance to this error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attaches the "delete the cache and re-run" guidance to a refresh error.
    ///
    /// Errors of any other kind are returned unchanged.
    pub fn with_cache_hint(self, cache_path: &Path) -> Self {
        if self.code != ErrorCode::RefreshFailed {
            return self;
        }
        self.with_hint(format!(
            "consider deleting {} and running again to re-authorize",
            cache_path.display()
        ))
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns user guidance, if any.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Returns true if this error happened while obtaining a credential.
    pub fn is_auth_class(&self) -> bool {
        self.code.is_auth_class()
    }
}

impl fmt::Display for GoogleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for Google operations.
pub type GoogleResult<T> = Result<T, GoogleError>;
