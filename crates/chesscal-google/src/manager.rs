//! Credential resolution.
//!
//! [`CredentialManager`] returns a usable credential for the current run:
//!
//! ```text
//!  cache file ──load──▶ valid? ──yes──────────────────────────▶ return
//!                         │ no
//!                         ├── expired + refresh token ─▶ refresh ─┐
//!                         └── otherwise ──────────────▶ authorize ─┤
//!                                                                  ▼
//!                                                        save to cache ─▶ return
//! ```
//!
//! The network side is abstracted behind [`AuthorizationServer`] so the
//! decision logic can be exercised without Google.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info, warn};

use crate::config::{ClientSecret, GoogleConfig};
use crate::error::GoogleResult;
use crate::oauth::OAuthClient;
use crate::tokens::{Credential, TokenCache};

/// A boxed future for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The authorization server operations the manager depends on.
pub trait AuthorizationServer: Send + Sync {
    /// Runs the interactive consent flow for the given scopes.
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, GoogleResult<Credential>>;

    /// Performs one refresh exchange for an expired credential.
    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, GoogleResult<Credential>>;
}

/// How the returned credential was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from the cache and still valid.
    Cache,
    /// Refreshed from an expired cached credential.
    Refreshed,
    /// Granted by the interactive flow.
    Authorized,
}

/// Resolves credentials from the cache, a refresh exchange or the
/// interactive flow.
#[derive(Debug)]
pub struct CredentialManager<A> {
    cache: TokenCache,
    scopes: Vec<String>,
    server: A,
}

impl<A: AuthorizationServer> CredentialManager<A> {
    /// Creates a manager over the given cache and authorization server.
    pub fn new(cache: TokenCache, scopes: Vec<String>, server: A) -> Self {
        Self {
            cache,
            scopes,
            server,
        }
    }

    /// Returns the credential cache.
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Returns a valid credential.
    ///
    /// A valid cached credential is returned as is, without touching the disk
    /// or the network. Otherwise exactly one refresh or authorization is
    /// attempted and its result overwrites the cache.
    ///
    /// # Errors
    ///
    /// A failed refresh is reported as `RefreshFailed` with a hint to delete
    /// the cache; it does not fall back to the interactive flow.
    pub async fn resolve(&self) -> GoogleResult<Credential> {
        self.resolve_with_source().await.map(|(credential, _)| credential)
    }

    /// Like [`resolve`](Self::resolve), also reporting where the credential
    /// came from.
    pub async fn resolve_with_source(&self) -> GoogleResult<(Credential, CredentialSource)> {
        let cached = self.load_usable()?;

        if let Some(credential) = cached.as_ref().filter(|c| c.is_valid()) {
            debug!("using cached credential");
            return Ok((credential.clone(), CredentialSource::Cache));
        }

        let (credential, source) = match cached {
            Some(expired) if expired.is_expired() && expired.can_refresh() => {
                info!("cached credential expired, refreshing");
                let refreshed = self
                    .server
                    .refresh(&expired)
                    .await
                    .map_err(|e| e.with_cache_hint(self.cache.path()))?;
                (refreshed, CredentialSource::Refreshed)
            }
            _ => {
                info!("no usable cached credential, starting authorization");
                let granted = self.server.authorize(&self.scopes).await?;
                (granted, CredentialSource::Authorized)
            }
        };

        self.cache.save(&credential)?;
        info!("credential saved to {:?}", self.cache.path());
        Ok((credential, source))
    }

    /// Loads the cached credential, dropping one that lacks required scopes.
    fn load_usable(&self) -> GoogleResult<Option<Credential>> {
        let Some(credential) = self.cache.load()? else {
            return Ok(None);
        };

        if !credential.has_scopes(&self.scopes) {
            warn!(
                "cached credential lacks required scopes {:?}, re-authorizing",
                self.scopes
            );
            return Ok(None);
        }

        Ok(Some(credential))
    }
}

/// Resolves a credential using the client secret and cache from `config`.
///
/// A missing client-secret file fails with `SecretNotFound` before any
/// network activity.
pub async fn resolve_credential(config: &GoogleConfig) -> GoogleResult<Credential> {
    config.validate()?;

    let secret = ClientSecret::from_file(&config.secret_path)?;
    let oauth_client =
        OAuthClient::new(secret, config.timeout)?.with_loopback_port(config.loopback_port);

    let manager = CredentialManager::new(
        TokenCache::new(&config.token_path),
        config.scopes.clone(),
        oauth_client,
    );
    manager.resolve().await
}
