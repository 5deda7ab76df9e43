//! Access token providers
//!
//! The client never knows how a bearer token was obtained. It asks a
//! [`TokenProvider`] for one before each request and calls
//! [`TokenProvider::invalidate`] when Spotify answers 401.
//!
//! [`RefreshTokenProvider`] is the standard OAuth refresh-token source; the
//! interactive authorization that produced the refresh token happens elsewhere.

use crate::error::{Result, SpotifyError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Tokens are refreshed this long before Spotify says they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Used when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Source of bearer tokens for the Web API
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a currently valid access token
    async fn access_token(&self) -> Result<String>;

    /// Drops any cached token so the next call fetches a fresh one
    async fn invalidate(&self) {}
}

/// Fixed bearer token supplied from outside
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Application credentials plus the user's refresh token
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct TokenState {
    refresh_token: String,
    access_token: Option<(String, Instant)>,
}

/// Refresh-token grant against the Spotify accounts service
///
/// The access token is cached until shortly before it expires. The state
/// mutex is held across the token request so concurrent callers wait for a
/// single refresh instead of each issuing one.
pub struct RefreshTokenProvider {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    state: Mutex<TokenState>,
}

impl RefreshTokenProvider {
    pub fn new(http: Client, token_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            state: Mutex::new(TokenState {
                refresh_token: credentials.refresh_token,
                access_token: None,
            }),
        }
    }

    async fn request_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        debug!(url = %self.token_url, "Refreshing Spotify access token");

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(SpotifyError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenResponse>()
                .await
                .map_err(|e| SpotifyError::malformed(format!("token response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<TokenErrorResponse>(&body)
            .map(|e| e.error_description.unwrap_or(e.error))
            .unwrap_or_default();
        warn!(status = status.as_u16(), reason = %reason, "Token endpoint rejected refresh");

        match status.as_u16() {
            400 | 401 => Err(SpotifyError::Unauthorized(format!(
                "refresh token rejected ({}), re-run the authorization flow",
                if reason.is_empty() { "no reason given" } else { &reason }
            ))),
            code => Err(SpotifyError::from_status_code(code)),
        }
    }
}

impl fmt::Debug for RefreshTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenProvider")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if let Some((token, valid_until)) = &state.access_token {
            if Instant::now() < *valid_until {
                return Ok(token.clone());
            }
        }

        let response = self.request_token(&state.refresh_token).await?;

        let lifetime =
            Duration::from_secs(response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS));
        let valid_until = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);

        if let Some(rotated) = response.refresh_token.filter(|t| !t.is_empty()) {
            if rotated != state.refresh_token {
                info!("Spotify rotated the refresh token");
                state.refresh_token = rotated;
            }
        }

        state.access_token = Some((response.access_token.clone(), valid_until));
        debug!(expires_in = lifetime.as_secs(), "Access token refreshed");
        Ok(response.access_token)
    }

    async fn invalidate(&self) {
        self.state.lock().await.access_token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("abc");
        assert_eq!(provider.access_token().await.unwrap(), "abc");
        provider.invalidate().await;
        assert_eq!(provider.access_token().await.unwrap(), "abc");
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("id", "very-secret", "refresh-me");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("id"));
        assert!(!shown.contains("very-secret"));
        assert!(!shown.contains("refresh-me"));
    }
}
