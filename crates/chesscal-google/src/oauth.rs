//! OAuth 2.0 installed-application flow for Google.
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) using a
//! loopback redirect, plus the refresh exchange.
//!
//! # Flow Overview
//!
//! 1. Generate a code verifier, its SHA-256 challenge and a random state
//! 2. Bind a listener on `127.0.0.1` (port 0 picks a free port)
//! 3. Open the user's browser on the consent page
//! 4. Google redirects to `/callback` with the authorization code
//! 5. Exchange the code (with verifier) for access and refresh tokens

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ClientSecret;
use crate::error::{ErrorCode, GoogleError, GoogleResult};
use crate::manager::{AuthorizationServer, BoxFuture};
use crate::tokens::Credential;

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Timeout for waiting for the OAuth callback.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Path the loopback listener expects the redirect on.
const CALLBACK_PATH: &str = "/callback";

/// OAuth client for Google's authorization server.
#[derive(Debug)]
pub struct OAuthClient {
    secret: ClientSecret,
    http_client: reqwest::Client,
    loopback_port: u16,
}

impl OAuthClient {
    /// Creates a new OAuth client for the given client secret.
    pub fn new(secret: ClientSecret, timeout: Duration) -> GoogleResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                GoogleError::internal(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            secret,
            http_client,
            loopback_port: 0,
        })
    }

    /// Sets the loopback listener port. `0` picks a free port.
    pub fn with_loopback_port(mut self, port: u16) -> Self {
        self.loopback_port = port;
        self
    }

    /// Runs the interactive flow and returns the granted credential.
    ///
    /// Blocks until the browser redirect arrives or [`CALLBACK_TIMEOUT`]
    /// elapses.
    pub async fn run_authorization_flow(&self, scopes: &[String]) -> GoogleResult<Credential> {
        let pkce = PkceFlow::new();

        let listener = TcpListener::bind(("127.0.0.1", self.loopback_port)).map_err(|e| {
            GoogleError::authorization(format!(
                "failed to bind loopback listener on port {}: {}",
                self.loopback_port, e
            ))
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| GoogleError::internal(format!("failed to read listener address: {}", e)))?
            .port();
        debug!("bound loopback listener on port {}", port);

        let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);
        let auth_url = pkce.build_auth_url(
            &self.secret.auth_uri,
            &self.secret.client_id,
            &redirect_uri,
            scopes,
        );

        info!("starting OAuth flow, opening browser...");
        debug!("authorization URL: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let (code, received_state) = wait_for_callback(listener, CALLBACK_TIMEOUT)?;

        if received_state != pkce.state {
            return Err(GoogleError::authorization(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens...");
        self.exchange_code(&code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }

    /// Trades the credential's refresh token for a new access token.
    pub async fn refresh_credential(&self, credential: &Credential) -> GoogleResult<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| GoogleError::refresh("credential has no refresh token"))?;

        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .post_token_request(&params, GoogleError::refresh)
            .await
            .and_then(|body| TokenResponse::parse(&body))
            .map_err(|e| in_class(e, ErrorCode::RefreshFailed))?;

        info!("successfully refreshed access token");
        Ok(credential.refreshed(
            response.access_token,
            response.refresh_token,
            response.expires_in,
        ))
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> GoogleResult<Credential> {
        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .post_token_request(&params, GoogleError::authorization)
            .await
            .and_then(|body| TokenResponse::parse(&body))
            .map_err(|e| in_class(e, ErrorCode::AuthorizationFailed))?;

        info!("successfully obtained tokens");
        let granted = response.granted_scopes(scopes);
        Ok(Credential::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            granted,
        ))
    }

    /// Posts a form to the token endpoint and returns the response body.
    ///
    /// Non-success statuses are reported through `rejected`.
    async fn post_token_request(
        &self,
        params: &[(&str, &str)],
        rejected: fn(String) -> GoogleError,
    ) -> GoogleResult<String> {
        let response = self
            .http_client
            .post(&self.secret.token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                GoogleError::network(format!("token request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GoogleError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(rejected(format!(
                "token endpoint rejected the request ({}): {}",
                status, body
            )));
        }

        Ok(body)
    }
}

impl AuthorizationServer for OAuthClient {
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, GoogleResult<Credential>> {
        Box::pin(self.run_authorization_flow(scopes))
    }

    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, GoogleResult<Credential>> {
        Box::pin(self.refresh_credential(credential))
    }
}

/// Waits for the OAuth redirect and extracts `(code, state)`.
fn wait_for_callback(listener: TcpListener, timeout: Duration) -> GoogleResult<(String, String)> {
    listener
        .set_nonblocking(false)
        .map_err(|e| GoogleError::internal(format!("failed to set blocking: {}", e)))?;

    let (tx, rx) = mpsc::channel();

    // Accept on a helper thread so the wait below can time out
    let _handle = thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(GoogleError::authorization("OAuth callback timeout"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(GoogleError::internal("callback channel disconnected"))
        }
    }
}

/// Handles one request on the loopback listener.
///
/// Returns `None` for requests that are not the OAuth redirect (favicon etc.).
fn handle_callback(mut stream: TcpStream) -> Option<GoogleResult<(String, String)>> {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return None;
    }

    let result = parse_callback(&request_line)?;

    let response = if result.is_ok() {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>Authorization Successful</h1>\
        <p>You can close this window and return to the terminal.</p></body></html>"
    } else {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>Authorization Failed</h1>\
        <p>You can close this window.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// Parses a request line such as `GET /callback?code=...&state=... HTTP/1.1`.
fn parse_callback(request_line: &str) -> Option<GoogleResult<(String, String)>> {
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let target = parts.next()?;

    let url = Url::parse(&format!("http://127.0.0.1{}", target)).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(GoogleError::authorization(format!(
            "authorization denied: {}",
            error
        ))));
    }

    match code {
        Some(code) => Some(Ok((code, state.unwrap_or_default()))),
        None => Some(Err(GoogleError::authorization(
            "missing authorization code in callback",
        ))),
    }
}

/// PKCE flow state.
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        let state = random_token(16);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the consent page URL.
    pub fn build_auth_url(
        &self,
        auth_uri: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_uri,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Reports a failed token exchange under `code`, keeping the original error
/// as its source.
fn in_class(err: GoogleError, code: ErrorCode) -> GoogleError {
    if err.code() == code {
        return err;
    }
    let message = err.message().to_string();
    GoogleError::new(code, message).with_source(err)
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Space-separated scopes actually granted.
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn parse(body: &str) -> GoogleResult<Self> {
        serde_json::from_str(body).map_err(|e| {
            GoogleError::invalid_response(format!("invalid token response: {}", e))
        })
    }

    /// Returns the granted scopes, falling back to the requested ones.
    fn granted_scopes(&self, requested: &[String]) -> Vec<String> {
        match &self.scope {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(String::from).collect()
            }
            _ => requested.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GOOGLE_AUTH_URL;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scopes() -> Vec<String> {
        vec!["https://www.googleapis.com/auth/calendar.events".to_string()]
    }

    fn client_for(server: &MockServer) -> OAuthClient {
        let secret = ClientSecret::new("test.apps.googleusercontent.com", "test-secret")
            .with_token_uri(format!("{}/token", server.uri()));
        OAuthClient::new(secret, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn pkce_verifier_length() {
        let flow = PkceFlow::new();
        // Base64 encoding of 32 bytes = 43 characters (no padding)
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_is_deterministic() {
        assert_eq!(
            PkceFlow::compute_challenge("verifier"),
            PkceFlow::compute_challenge("verifier")
        );
        // RFC 7636 appendix B
        assert_eq!(
            PkceFlow::compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn pkce_state_is_random() {
        assert_ne!(PkceFlow::new().state, PkceFlow::new().state);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            GOOGLE_AUTH_URL,
            "test-client.apps.googleusercontent.com",
            "http://127.0.0.1:8080/callback",
            &scopes(),
        );

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2Fcallback"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains(&format!("state={}", flow.state)));
    }

    #[test]
    fn parse_callback_success() {
        let result = parse_callback("GET /callback?state=abc&code=4%2F0Ad HTTP/1.1\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(result, ("4/0Ad".to_string(), "abc".to_string()));
    }

    #[test]
    fn parse_callback_denied() {
        let err = parse_callback("GET /callback?error=access_denied&state=abc HTTP/1.1")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthorizationFailed);
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn parse_callback_missing_code() {
        let err = parse_callback("GET /callback?state=abc HTTP/1.1")
            .unwrap()
            .unwrap_err();
        assert!(err.message().contains("missing authorization code"));
    }

    #[test]
    fn parse_callback_ignores_other_requests() {
        assert!(parse_callback("GET /favicon.ico HTTP/1.1").is_none());
        assert!(parse_callback("POST /callback?code=x HTTP/1.1").is_none());
        assert!(parse_callback("").is_none());
    }

    #[test]
    fn callback_listener_receives_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let browser = thread::spawn(move || {
            let mut favicon = TcpStream::connect(("127.0.0.1", port)).unwrap();
            favicon.write_all(b"GET /favicon.ico HTTP/1.1\r\n\r\n").unwrap();
            drop(favicon);

            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream
                .write_all(b"GET /callback?code=the-code&state=the-state HTTP/1.1\r\n\r\n")
                .unwrap();
            let mut reply = String::new();
            BufReader::new(stream).read_line(&mut reply).unwrap();
            reply
        });

        let (code, state) = wait_for_callback(listener, Duration::from_secs(10)).unwrap();
        assert_eq!(code, "the-code");
        assert_eq!(state, "the-state");
        assert!(browser.join().unwrap().starts_with("HTTP/1.1 200"));
    }

    #[test]
    fn callback_listener_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let err = wait_for_callback(listener, Duration::from_millis(50)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthorizationFailed);
    }

    #[test]
    fn granted_scopes_prefer_response() {
        let response = TokenResponse::parse(
            r#"{"access_token": "a", "scope": "scope1 scope2", "expires_in": 3599}"#,
        )
        .unwrap();
        assert_eq!(
            response.granted_scopes(&scopes()),
            vec!["scope1".to_string(), "scope2".to_string()]
        );

        let response = TokenResponse::parse(r#"{"access_token": "a"}"#).unwrap();
        assert_eq!(response.granted_scopes(&scopes()), scopes());
    }

    #[tokio::test]
    async fn refresh_exchanges_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"access_token": "new-access", "expires_in": 3599, "token_type": "Bearer"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let expired = Credential {
            access_token: "old-access".to_string(),
            refresh_token: Some("old-refresh".to_string()),
            expiry: Some(chrono::Utc::now() - chrono::Duration::hours(1)),
            scopes: scopes(),
        };

        let refreshed = client_for(&server).refresh_credential(&expired).await.unwrap();
        assert_eq!(refreshed.access_token, "new-access");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("old-refresh"));
        assert!(refreshed.is_valid());
    }

    #[tokio::test]
    async fn refresh_rejected_is_refresh_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#,
            ))
            .mount(&server)
            .await;

        let credential = Credential::new("a", Some("revoked".to_string()), Some(-10), scopes());
        let err = client_for(&server)
            .refresh_credential(&credential)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RefreshFailed);
        assert!(err.message().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn refresh_with_garbage_body_is_refresh_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let credential = Credential::new("a", Some("r".to_string()), None, scopes());
        let err = client_for(&server)
            .refresh_credential(&credential)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RefreshFailed);
        assert!(err.is_auth_class());
        assert!(err.message().contains("invalid token response"));

        use std::error::Error;
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn refresh_transport_failure_is_refresh_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let secret = ClientSecret::new("test.apps.googleusercontent.com", "test-secret")
            .with_token_uri(format!("http://127.0.0.1:{}/token", port));
        let client = OAuthClient::new(secret, Duration::from_secs(5)).unwrap();

        let credential = Credential::new("a", Some("r".to_string()), Some(-10), scopes());
        let err = client
            .refresh_credential(&credential)
            .await
            .unwrap_err()
            .with_cache_hint(std::path::Path::new("token.json"));
        assert_eq!(err.code(), ErrorCode::RefreshFailed);
        assert!(err.message().contains("token request failed"));
        assert!(err.hint().unwrap().contains("token.json"));
    }

    #[tokio::test]
    async fn exchange_code_with_garbage_body_is_authorization_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .exchange_code("code", "verifier", "http://127.0.0.1:1/callback", &scopes())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AuthorizationFailed);
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_locally() {
        let server = MockServer::start().await;
        let credential = Credential::new("a", None, None, scopes());
        let err = client_for(&server)
            .refresh_credential(&credential)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RefreshFailed);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exchange_code_builds_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier=verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{
                    "access_token": "access",
                    "refresh_token": "refresh",
                    "expires_in": 3599,
                    "scope": "https://www.googleapis.com/auth/calendar.events"
                }"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let credential = client_for(&server)
            .exchange_code("code", "verifier", "http://127.0.0.1:1/callback", &scopes())
            .await
            .unwrap();
        assert_eq!(credential.access_token, "access");
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh"));
        assert!(credential.has_scopes(&scopes()));
    }
}
