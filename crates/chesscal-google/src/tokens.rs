//! Credential model and on-disk credential cache.
//!
//! The cache file uses the field names of Google's "authorized user" JSON
//! (`token`, `refresh_token`, `expiry`, `scopes`), so a file written by
//! Google's own client libraries can be read as well.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{GoogleError, GoogleResult};

/// How long before the real expiry a credential is already treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// An OAuth token bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token for API requests.
    #[serde(rename = "token")]
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token expires.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Creates a credential from token endpoint data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expiry: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes,
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    /// Returns true if the credential can be used for API calls as is.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Returns true if a refresh exchange is possible.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Returns true if the granted scopes cover all required scopes.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns a copy carrying a refreshed access token.
    ///
    /// The refresh token is replaced only when the server issued a new one.
    pub fn refreshed(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.or_else(|| self.refresh_token.clone()),
            expiry: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes: self.scopes.clone(),
        }
    }
}

/// File-backed credential cache.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// Creates a cache at the given path. Nothing is read until [`load`].
    ///
    /// [`load`]: TokenCache::load
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a cache file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the cached credential.
    ///
    /// Returns `Ok(None)` when no cache file exists, and also when the file is
    /// unreadable as a credential; the next successful grant overwrites it.
    pub fn load(&self) -> GoogleResult<Option<Credential>> {
        if !self.path.exists() {
            debug!("no credential cache at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            GoogleError::cache(format!("failed to read credential cache: {}", e)).with_source(e)
        })?;

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => {
                info!("loaded credential from {:?}", self.path);
                Ok(Some(credential))
            }
            Err(e) => {
                warn!("ignoring unreadable credential cache {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    /// Writes the credential, replacing any previous content.
    ///
    /// Each write goes to its own temp file in the cache directory, created
    /// with `0600` permissions on Unix, and is renamed over the cache. With
    /// concurrent writers the last rename wins.
    pub fn save(&self, credential: &Credential) -> GoogleResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| {
            GoogleError::cache(format!("failed to create cache directory: {}", e)).with_source(e)
        })?;

        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| GoogleError::internal(format!("failed to serialize credential: {}", e)))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
            GoogleError::cache(format!("failed to create temp cache file: {}", e)).with_source(e)
        })?;
        temp.write_all(content.as_bytes()).map_err(|e| {
            GoogleError::cache(format!("failed to write credential cache: {}", e)).with_source(e)
        })?;

        temp.persist(&self.path).map_err(|e| {
            GoogleError::cache(format!("failed to replace credential cache: {}", e.error))
                .with_source(e.error)
        })?;

        debug!("saved credential to {:?}", self.path);
        Ok(())
    }

    /// Removes the cache file, if present.
    pub fn clear(&self) -> GoogleResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                GoogleError::cache(format!("failed to remove credential cache: {}", e))
            })?;
            info!("cleared credential cache {:?}", self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Vec<String> {
        vec!["https://www.googleapis.com/auth/calendar.events".to_string()]
    }

    #[test]
    fn credential_creation() {
        let credential = Credential::new("access", Some("refresh".to_string()), Some(3600), scopes());
        assert!(credential.expiry.is_some());
        assert!(!credential.is_expired());
        assert!(credential.is_valid());
        assert!(credential.can_refresh());
    }

    #[test]
    fn credential_expired() {
        let mut credential = Credential::new("access", None, Some(3600), scopes());
        credential.expiry = Some(Utc::now() - Duration::hours(1));
        assert!(credential.is_expired());
        assert!(!credential.is_valid());
        assert!(!credential.can_refresh());
    }

    #[test]
    fn credential_within_skew_is_expired() {
        let mut credential = Credential::new("access", None, None, scopes());
        credential.expiry = Some(Utc::now() + Duration::seconds(30));
        assert!(credential.is_expired());
    }

    #[test]
    fn credential_without_expiry_never_expires() {
        let credential = Credential::new("access", None, None, scopes());
        assert!(!credential.is_expired());
        assert!(credential.is_valid());
    }

    #[test]
    fn empty_access_token_is_invalid() {
        let credential = Credential::new("", None, None, scopes());
        assert!(!credential.is_valid());
    }

    #[test]
    fn credential_scope_check() {
        let credential = Credential::new(
            "access",
            None,
            None,
            vec!["scope1".to_string(), "scope2".to_string()],
        );
        assert!(credential.has_scopes(&["scope1".to_string()]));
        assert!(credential.has_scopes(&["scope1".to_string(), "scope2".to_string()]));
        assert!(!credential.has_scopes(&["scope3".to_string()]));
    }

    #[test]
    fn refresh_keeps_refresh_token_and_scopes() {
        let mut old = Credential::new("old", Some("refresh".to_string()), None, scopes());
        old.expiry = Some(Utc::now() - Duration::hours(1));

        let new = old.refreshed("new", None, Some(3600));
        assert_eq!(new.access_token, "new");
        assert_eq!(new.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(new.scopes, scopes());
        assert!(new.is_valid());

        let rotated = old.refreshed("new", Some("rotated".to_string()), Some(3600));
        assert_eq!(rotated.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn reads_authorized_user_file() {
        let json = r#"{
            "token": "ya29.access",
            "refresh_token": "1//refresh",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/calendar.events"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2024-08-15T09:00:00.123456Z"
        }"#;

        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token, "ya29.access");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
        assert!(credential.is_expired());
        assert!(credential.has_scopes(&scopes()));
    }

    #[test]
    fn cache_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(tmp.path().join("token.json"));

        let credential = Credential::new("access", Some("refresh".to_string()), Some(3600), scopes());
        cache.save(&credential).unwrap();
        assert!(cache.exists());
        assert!(!tmp.path().join("token.json.tmp").exists());

        let loaded = TokenCache::new(cache.path()).load().unwrap().unwrap();
        assert_eq!(loaded, credential);
    }

    #[test]
    fn cache_save_creates_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(tmp.path().join("nested").join("token.json"));
        cache.save(&Credential::new("access", None, None, scopes())).unwrap();
        assert!(cache.exists());
    }

    #[cfg(unix)]
    #[test]
    fn cache_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(tmp.path().join("token.json"));
        cache.save(&Credential::new("access", None, None, scopes())).unwrap();

        let mode = fs::metadata(cache.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn concurrent_saves_all_succeed() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(tmp.path().join("token.json"));

        std::thread::scope(|scope| {
            for writer in 0..8 {
                let cache = &cache;
                scope.spawn(move || {
                    for round in 0..50 {
                        let credential = Credential::new(
                            format!("access-{}-{}", writer, round),
                            Some("refresh".to_string()),
                            Some(3600),
                            scopes(),
                        );
                        cache.save(&credential).unwrap();
                    }
                });
            }
        });

        let saved = cache.load().unwrap().unwrap();
        assert!(saved.access_token.starts_with("access-"));

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "token.json")
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
    }

    #[test]
    fn cache_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(tmp.path().join("token.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn cache_corrupt_file_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(TokenCache::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn cache_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(tmp.path().join("token.json"));
        cache.save(&Credential::new("access", None, None, scopes())).unwrap();

        cache.clear().unwrap();
        assert!(!cache.exists());
        cache.clear().unwrap();
    }
}
