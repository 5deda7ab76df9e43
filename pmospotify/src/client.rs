//! HTTP client for the Spotify Web API
//!
//! Four read-only endpoints are used, all relative to the API base
//! (`https://api.spotify.com/v1` by default):
//!
//! | Operation | Endpoint | Query |
//! |-----------|----------|-------|
//! | [`SpotifyClient::fetch_currently_playing`] | `/me/player/currently-playing` | `limit` |
//! | [`SpotifyClient::fetch_top_artists`] | `/me/top/artists` | `limit`, `time_range` |
//! | [`SpotifyClient::fetch_top_tracks`] | `/me/top/tracks` | `limit`, `time_range` |
//! | [`SpotifyClient::fetch_recently_played`] | `/me/player/recently-played` | `limit` |
//!
//! Status policy, shared by every call: 200 decodes the body, 204 yields
//! `Ok(None)`, anything else goes through [`SpotifyError::from_status_code`].
//! Bodies larger than [`MAX_RESPONSE_BYTES`] are rejected.
//!
//! # Example
//!
//! ```no_run
//! use pmospotify::{RequestContext, SpotifyClient, StaticToken};
//! use std::{sync::Arc, time::Duration};
//!
//! #[tokio::main]
//! async fn main() -> pmospotify::Result<()> {
//!     let client = SpotifyClient::builder()
//!         .token_provider(Arc::new(StaticToken::new("BQD...")))
//!         .build()?;
//!
//!     let ctx = RequestContext::with_timeout(Duration::from_secs(10));
//!     if let Some(playing) = client.fetch_currently_playing(&ctx).await? {
//!         println!("{:?}", playing.track.map(|t| t.name));
//!     }
//!     Ok(())
//! }
//! ```

use crate::auth::{Credentials, RefreshTokenProvider, TokenProvider};
use crate::context::RequestContext;
use crate::error::{Result, SpotifyError};
use crate::models::{
    CurrentlyPlaying, Limit, RecentlyPlayed, SpotifyArtist, SpotifyCurrentlyPlaying,
    SpotifyPaging, SpotifyPlayHistory, SpotifyTrack, TimeRange, TopArtists, TopTracks, Track,
};
use crate::options::SpotifyOptions;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Spotify Web API base URL
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// Default Spotify accounts token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Default timeout for HTTP requests (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "PMOSpotify/0.1.0 (pmospotify)";

/// Upper bound on a decoded response body (10 MiB)
pub const MAX_RESPONSE_BYTES: usize = 10 << 20;

const CURRENTLY_PLAYING_PATH: &str = "/me/player/currently-playing";
const RECENTLY_PLAYED_PATH: &str = "/me/player/recently-played";
const TOP_ARTISTS_PATH: &str = "/me/top/artists";
const TOP_TRACKS_PATH: &str = "/me/top/tracks";

/// Spotify Web API client
///
/// Holds only the transport, the token provider and static request
/// parameters, so one instance is shared by all concurrent fetches.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    api_base: String,
    tokens: Arc<dyn TokenProvider>,
    limit: Limit,
    time_range: TimeRange,
    max_response_bytes: usize,
}

impl fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("api_base", &self.api_base)
            .field("limit", &self.limit)
            .field("time_range", &self.time_range)
            .finish_non_exhaustive()
    }
}

impl SpotifyClient {
    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client authenticated with the refresh-token grant described by `options`
    pub fn from_options(options: &SpotifyOptions) -> Result<Self> {
        Self::builder()
            .api_base(&options.api_base)
            .token_url(&options.token_url)
            .credentials(options.credentials.clone())
            .limit(options.limit)
            .time_range(options.time_range)
            .timeout(options.request_timeout)
            .build()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Current playback; `Ok(None)` when Spotify answers 204 (nothing playing)
    pub async fn fetch_currently_playing(
        &self,
        ctx: &RequestContext,
    ) -> Result<Option<CurrentlyPlaying>> {
        let params = [("limit", self.limit.to_string())];
        let playing: Option<SpotifyCurrentlyPlaying> =
            self.get_json(ctx, CURRENTLY_PLAYING_PATH, &params).await?;
        Ok(playing.map(CurrentlyPlaying::from))
    }

    /// Top artists for the configured time range
    pub async fn fetch_top_artists(&self, ctx: &RequestContext) -> Result<Option<TopArtists>> {
        let page: Option<SpotifyPaging<SpotifyArtist>> = self
            .get_json(ctx, TOP_ARTISTS_PATH, &self.top_params())
            .await?;

        Ok(page.map(|page| TopArtists {
            artists: page
                .items
                .into_iter()
                .take(self.limit.get())
                .map(Into::into)
                .collect(),
            time_range: self.time_range,
        }))
    }

    /// Top tracks for the configured time range
    pub async fn fetch_top_tracks(&self, ctx: &RequestContext) -> Result<Option<TopTracks>> {
        let page: Option<SpotifyPaging<SpotifyTrack>> = self
            .get_json(ctx, TOP_TRACKS_PATH, &self.top_params())
            .await?;

        Ok(page.map(|page| TopTracks {
            tracks: page
                .items
                .into_iter()
                .take(self.limit.get())
                .map(Into::into)
                .collect(),
            time_range: self.time_range,
        }))
    }

    /// Recently played tracks, most recent first
    pub async fn fetch_recently_played(
        &self,
        ctx: &RequestContext,
    ) -> Result<Option<RecentlyPlayed>> {
        let params = [("limit", self.limit.to_string())];
        let page: Option<SpotifyPaging<SpotifyPlayHistory>> =
            self.get_json(ctx, RECENTLY_PLAYED_PATH, &params).await?;

        Ok(page.map(|page| {
            let mut items = page.items;
            // Items without played_at sort last
            items.sort_by(|a, b| b.played_at.cmp(&a.played_at));
            RecentlyPlayed {
                tracks: items
                    .into_iter()
                    .take(self.limit.get())
                    .map(|item| Track::from(item.track))
                    .collect(),
            }
        }))
    }

    /// Startup probe against the currently-playing endpoint
    ///
    /// Only `Unauthorized` is returned as an error. Any other failure is
    /// logged and ignored, as it says nothing about the credentials.
    pub async fn verify_credentials(&self, ctx: &RequestContext) -> Result<()> {
        match self.fetch_currently_playing(ctx).await {
            Ok(_) => {
                info!("✅ Spotify credentials verified");
                Ok(())
            }
            Err(e) if e.is_auth_error() => Err(e),
            Err(e) => {
                warn!("Could not verify Spotify credentials: {}", e);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn top_params(&self) -> [(&'static str, String); 2] {
        [
            ("limit", self.limit.to_string()),
            ("time_range", self.time_range.to_string()),
        ]
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.api_base, path))?)
    }

    /// Authenticated GET bounded by `ctx`
    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        ctx.run(self.get_json_inner(path, params)).await
    }

    async fn get_json_inner<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = self.endpoint(path)?;
        let token = self.tokens.access_token().await?;

        debug!(path = path, "GET Spotify API");
        let response = self
            .http
            .get(url)
            .query(params)
            .bearer_auth(token)
            .send()
            .await
            .map_err(SpotifyError::from_transport)?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NO_CONTENT => {
                debug!(path = path, "No content");
                return Ok(None);
            }
            StatusCode::UNAUTHORIZED => {
                warn!(path = path, "Access token rejected, invalidating");
                self.tokens.invalidate().await;
                return Err(SpotifyError::from_status_code(401));
            }
            status => {
                warn!(path = path, status = status.as_u16(), "Spotify API error");
                return Err(SpotifyError::from_status_code(status.as_u16()));
            }
        }

        let body = read_capped(response, self.max_response_bytes).await?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| SpotifyError::malformed(format!("{}: {}", path, e)))
    }
}

/// Reads the body, failing as soon as it grows past `max_bytes`
async fn read_capped(mut response: Response, max_bytes: usize) -> Result<Vec<u8>> {
    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(SpotifyError::malformed(format!(
                "response body of {} bytes exceeds the {} byte limit",
                len, max_bytes
            )));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(SpotifyError::from_transport)? {
        if body.len() + chunk.len() > max_bytes {
            return Err(SpotifyError::malformed(format!(
                "response body exceeds the {} byte limit",
                max_bytes
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Builder for SpotifyClient
pub struct ClientBuilder {
    api_base: String,
    token_url: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
    credentials: Option<Credentials>,
    limit: Limit,
    time_range: TimeRange,
    timeout: Duration,
    user_agent: String,
    max_response_bytes: usize,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            token_provider: None,
            credentials: None,
            limit: Limit::default(),
            time_range: TimeRange::default(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }
}

impl ClientBuilder {
    /// Set the API base URL (tests, proxies)
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// Set the token endpoint used with [`ClientBuilder::credentials`]
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Use an explicit token provider; takes precedence over credentials
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Authenticate with the refresh-token grant
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }

    pub fn time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    /// Set the per-request HTTP timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SpotifyClient> {
        let api_base = self.api_base.trim_end_matches('/').to_string();
        Url::parse(&api_base)?;

        let http = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()?;

        let tokens: Arc<dyn TokenProvider> = match (self.token_provider, self.credentials) {
            (Some(provider), _) => provider,
            (None, Some(credentials)) => {
                Url::parse(&self.token_url)?;
                Arc::new(RefreshTokenProvider::new(
                    http.clone(),
                    self.token_url,
                    credentials,
                ))
            }
            (None, None) => {
                return Err(SpotifyError::configuration(
                    "a token provider or Spotify credentials are required",
                ));
            }
        };

        Ok(SpotifyClient {
            http,
            api_base,
            tokens,
            limit: self.limit,
            time_range: self.time_range,
            max_response_bytes: self.max_response_bytes,
        })
    }
}
