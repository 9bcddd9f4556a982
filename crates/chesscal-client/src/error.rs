//! Client error types.

use std::fmt;

use chesscal_google::GoogleError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Authentication or Calendar API error.
    Google(GoogleError),
    /// IO error.
    Io(std::io::Error),
    /// One or more remote steps failed; each was already reported.
    RemoteSteps(Vec<String>),
}

impl ClientError {
    /// Returns user guidance for this error, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Google(err) => err.hint(),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Google(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::RemoteSteps(steps) => write!(f, "failed steps: {}", steps.join(", ")),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Google(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<GoogleError> for ClientError {
    fn from(err: GoogleError) -> Self {
        Self::Google(err)
    }
}
