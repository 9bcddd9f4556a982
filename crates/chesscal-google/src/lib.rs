//! Google authentication and Calendar API access for chesscal.
//!
//! - [`CredentialManager`] - Loads, refreshes or obtains an OAuth credential
//! - [`OAuthClient`] - Loopback PKCE flow and refresh exchange against Google
//! - [`TokenCache`] - On-disk credential cache
//! - [`CalendarClient`] - Inserts and lists events through Calendar v3
//! - [`GoogleError`] - Error types for all of the above
//!
//! # Example
//!
//! ```ignore
//! use chesscal_google::{CalendarClient, GoogleConfig, resolve_credential};
//!
//! let config = GoogleConfig::new("credentials.json");
//! let credential = resolve_credential(&config).await?;
//! let client = CalendarClient::new(&credential, config.timeout)?;
//! let events = client.list_upcoming("primary", chrono::Utc::now(), 10).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod tokens;

pub use client::CalendarClient;
pub use config::{CALENDAR_API_BASE, ClientSecret, GoogleConfig};
pub use error::{ErrorCode, GoogleError, GoogleResult};
pub use manager::{
    AuthorizationServer, BoxFuture, CredentialManager, CredentialSource, resolve_credential,
};
pub use oauth::{OAuthClient, PkceFlow};
pub use tokens::{Credential, TokenCache};
