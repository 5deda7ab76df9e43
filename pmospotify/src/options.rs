//! Explicit configuration value for the Spotify pipeline
//!
//! Built once at startup (usually by
//! [`SpotifyConfigExt::spotify_options`](crate::SpotifyConfigExt::spotify_options))
//! and passed by value to the client, the cache and the HTTP state.

use crate::aggregator::FailurePolicy;
use crate::auth::Credentials;
use crate::client::{DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOKEN_URL};
use crate::error::{Result, SpotifyError};
use crate::models::{Limit, TimeRange};
use std::time::Duration;
use url::Url;

/// Default snapshot TTL (3 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 180;

#[derive(Debug, Clone)]
pub struct SpotifyOptions {
    pub credentials: Credentials,
    /// Items per list, clamped into 1..=50
    pub limit: Limit,
    pub time_range: TimeRange,
    /// How long a snapshot is served before the next request refreshes it
    pub cache_ttl: Duration,
    /// Deadline of each inbound `/api` request
    pub request_timeout: Duration,
    pub failure_policy: FailurePolicy,
    pub api_base: String,
    pub token_url: String,
}

impl SpotifyOptions {
    /// Options with every field but the credentials at its default
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            limit: Limit::default(),
            time_range: TimeRange::default(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            failure_policy: FailurePolicy::default(),
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let creds = &self.credentials;
        for (name, value) in [
            ("client_id", &creds.client_id),
            ("client_secret", &creds.client_secret),
            ("refresh_token", &creds.refresh_token),
        ] {
            if value.trim().is_empty() {
                return Err(SpotifyError::configuration(format!(
                    "sources.spotify.{} is required",
                    name
                )));
            }
        }

        if self.cache_ttl.is_zero() {
            return Err(SpotifyError::configuration("cache_ttl must be greater than 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(SpotifyError::configuration(
                "request_timeout must be greater than 0",
            ));
        }

        Url::parse(&self.api_base)?;
        Url::parse(&self.token_url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("id", "secret", "refresh")
    }

    #[test]
    fn test_defaults() {
        let options = SpotifyOptions::new(creds());
        assert_eq!(options.limit.get(), 5);
        assert_eq!(options.time_range, TimeRange::ShortTerm);
        assert_eq!(options.cache_ttl, Duration::from_secs(180));
        assert_eq!(options.request_timeout, Duration::from_secs(10));
        assert_eq!(options.failure_policy, FailurePolicy::Lenient);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut options = SpotifyOptions::new(Credentials::new("id", " ", "refresh"));
        assert!(matches!(
            options.validate(),
            Err(SpotifyError::Configuration(msg)) if msg.contains("client_secret")
        ));

        options.credentials = creds();
        options.cache_ttl = Duration::ZERO;
        assert!(options.validate().is_err());

        options.cache_ttl = Duration::from_secs(60);
        options.api_base = "::nope".into();
        assert!(matches!(options.validate(), Err(SpotifyError::InvalidUrl(_))));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let shown = format!("{:?}", SpotifyOptions::new(creds()));
        assert!(!shown.contains("secret\""));
        assert!(shown.contains("<redacted>"));
    }
}
