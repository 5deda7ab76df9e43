//! Extension pour intégrer Spotify dans pmoconfig
//!
//! Ce module fournit le trait `SpotifyConfigExt` qui ajoute à
//! `pmoconfig::Config` la lecture de la section `sources.spotify` et la
//! construction de [`SpotifyOptions`].
//!
//! # Identifiants
//!
//! `client_id`, `client_secret` et `refresh_token` sont lus dans la
//! configuration (le secret et le token peuvent être scellés, voir
//! `pmoconfig::encryption`). S'ils sont absents, les variables
//! `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET` et `SPOTIFY_REFRESH_TOKEN`
//! sont utilisées.
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmospotify::SpotifyConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let options = config.spotify_options()?;
//! println!("limit={} time_range={}", options.limit, options.time_range);
//! # Ok(())
//! # }
//! ```

use crate::aggregator::FailurePolicy;
use crate::auth::Credentials;
use crate::client::{DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOKEN_URL};
use crate::models::{Limit, TimeRange};
use crate::options::{DEFAULT_CACHE_TTL_SECS, SpotifyOptions};
use anyhow::{Result, anyhow};
use pmoconfig::Config;
use serde_yaml::{Number, Value};
use std::env;
use std::time::Duration;
use tracing::warn;

const SECTION: [&str; 2] = ["sources", "spotify"];

const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
const ENV_REFRESH_TOKEN: &str = "SPOTIFY_REFRESH_TOKEN";

fn path(key: &str) -> [&str; 3] {
    [SECTION[0], SECTION[1], key]
}

/// Config value first, then the environment variable
fn with_env_fallback(configured: Option<String>, env_var: &str) -> Option<String> {
    configured.or_else(|| {
        env::var(env_var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Trait d'extension pour gérer la configuration Spotify dans pmoconfig
pub trait SpotifyConfigExt {
    // ========================================================================
    // Credentials
    // ========================================================================

    fn get_spotify_client_id(&self) -> Result<Option<String>>;

    /// Client secret, opened if sealed
    fn get_spotify_client_secret(&self) -> Result<Option<String>>;

    /// Refresh token, opened if sealed
    fn get_spotify_refresh_token(&self) -> Result<Option<String>>;

    /// Stores a refresh token, sealed
    ///
    /// Called by the external authorization flow once it has obtained a token.
    fn set_spotify_refresh_token(&self, token: &str) -> Result<()>;

    // ========================================================================
    // Request parameters
    // ========================================================================

    /// Items per list, clamped into 1..=50 (default 5)
    fn get_spotify_limit(&self) -> Result<Limit>;

    fn set_spotify_limit(&self, limit: i64) -> Result<()>;

    /// Time range of the top lists (default `short_term`)
    fn get_spotify_time_range(&self) -> Result<TimeRange>;

    fn set_spotify_time_range(&self, time_range: TimeRange) -> Result<()>;

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Snapshot TTL (default 180 s)
    fn get_spotify_cache_ttl(&self) -> Result<Duration>;

    fn set_spotify_cache_ttl(&self, ttl_secs: u64) -> Result<()>;

    /// Deadline of each `/api` request (default 10 s)
    fn get_spotify_request_timeout(&self) -> Result<Duration>;

    fn get_spotify_failure_policy(&self) -> Result<FailurePolicy>;

    fn set_spotify_failure_policy(&self, policy: FailurePolicy) -> Result<()>;

    fn get_spotify_api_base(&self) -> Result<String>;

    fn get_spotify_token_url(&self) -> Result<String>;

    /// Builds and validates the options of the whole pipeline
    fn spotify_options(&self) -> Result<SpotifyOptions>;
}

impl SpotifyConfigExt for Config {
    fn get_spotify_client_id(&self) -> Result<Option<String>> {
        Ok(with_env_fallback(
            self.get_string(&path("client_id")),
            ENV_CLIENT_ID,
        ))
    }

    fn get_spotify_client_secret(&self) -> Result<Option<String>> {
        Ok(with_env_fallback(
            self.get_secret(&path("client_secret"))?,
            ENV_CLIENT_SECRET,
        ))
    }

    fn get_spotify_refresh_token(&self) -> Result<Option<String>> {
        Ok(with_env_fallback(
            self.get_secret(&path("refresh_token"))?,
            ENV_REFRESH_TOKEN,
        ))
    }

    fn set_spotify_refresh_token(&self, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            return Err(anyhow!("refusing to store an empty refresh token"));
        }
        self.set_secret(&path("refresh_token"), token.trim())
    }

    fn get_spotify_limit(&self) -> Result<Limit> {
        let raw = match self.get_value(&path("limit")) {
            Ok(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| anyhow!("sources.spotify.limit must be an integer, got {}", n))?,
            Ok(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| anyhow!("sources.spotify.limit must be an integer, got '{}'", s))?,
            _ => return Ok(Limit::default()),
        };

        let limit = Limit::clamped(raw);
        if limit.get() as i64 != raw {
            warn!(configured = raw, used = limit.get(), "Spotify limit clamped into 1..=50");
        }
        Ok(limit)
    }

    fn set_spotify_limit(&self, limit: i64) -> Result<()> {
        self.set_value(&path("limit"), Value::Number(Number::from(limit)))
    }

    fn get_spotify_time_range(&self) -> Result<TimeRange> {
        match self.get_string(&path("time_range")) {
            Some(s) => Ok(s.parse()?),
            None => Ok(TimeRange::default()),
        }
    }

    fn set_spotify_time_range(&self, time_range: TimeRange) -> Result<()> {
        self.set_value(
            &path("time_range"),
            Value::String(time_range.as_str().to_string()),
        )
    }

    fn get_spotify_cache_ttl(&self) -> Result<Duration> {
        read_secs(self, "cache_ttl_secs", DEFAULT_CACHE_TTL_SECS)
    }

    fn set_spotify_cache_ttl(&self, ttl_secs: u64) -> Result<()> {
        self.set_value(&path("cache_ttl_secs"), Value::Number(Number::from(ttl_secs)))
    }

    fn get_spotify_request_timeout(&self) -> Result<Duration> {
        read_secs(self, "request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    fn get_spotify_failure_policy(&self) -> Result<FailurePolicy> {
        match self.get_string(&path("failure_policy")) {
            Some(s) => Ok(s.parse()?),
            None => Ok(FailurePolicy::default()),
        }
    }

    fn set_spotify_failure_policy(&self, policy: FailurePolicy) -> Result<()> {
        self.set_value(&path("failure_policy"), Value::String(policy.to_string()))
    }

    fn get_spotify_api_base(&self) -> Result<String> {
        Ok(self
            .get_string(&path("api_base"))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()))
    }

    fn get_spotify_token_url(&self) -> Result<String> {
        Ok(self
            .get_string(&path("token_url"))
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()))
    }

    fn spotify_options(&self) -> Result<SpotifyOptions> {
        let missing = |name: &str, env_var: &str| {
            anyhow!(
                "Spotify {} is not configured (set sources.spotify.{} or {})",
                name,
                name,
                env_var
            )
        };

        let credentials = Credentials::new(
            self.get_spotify_client_id()?
                .ok_or_else(|| missing("client_id", ENV_CLIENT_ID))?,
            self.get_spotify_client_secret()?
                .ok_or_else(|| missing("client_secret", ENV_CLIENT_SECRET))?,
            self.get_spotify_refresh_token()?
                .ok_or_else(|| missing("refresh_token", ENV_REFRESH_TOKEN))?,
        );

        let options = SpotifyOptions {
            credentials,
            limit: self.get_spotify_limit()?,
            time_range: self.get_spotify_time_range()?,
            cache_ttl: self.get_spotify_cache_ttl()?,
            request_timeout: self.get_spotify_request_timeout()?,
            failure_policy: self.get_spotify_failure_policy()?,
            api_base: self.get_spotify_api_base()?,
            token_url: self.get_spotify_token_url()?,
        };
        options.validate()?;
        Ok(options)
    }
}

fn read_secs(config: &Config, key: &str, default: u64) -> Result<Duration> {
    let secs = match config.get_value(&path(key)) {
        Ok(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| anyhow!("sources.spotify.{} must be a positive integer", key))?,
        Ok(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow!("sources.spotify.{} must be a positive integer", key))?,
        _ => default,
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn load_with(yaml: &str) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), yaml).unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    const CREDENTIALS: &str = "sources:\n  spotify:\n    client_id: my-id\n    client_secret: my-secret\n    refresh_token: my-refresh\n";

    #[test]
    fn test_defaults() {
        let (_dir, config) = load_with(CREDENTIALS);
        let options = config.spotify_options().unwrap();

        assert_eq!(options.credentials.client_id, "my-id");
        assert_eq!(options.credentials.refresh_token, "my-refresh");
        assert_eq!(options.limit.get(), 5);
        assert_eq!(options.time_range, TimeRange::ShortTerm);
        assert_eq!(options.cache_ttl, Duration::from_secs(180));
        assert_eq!(options.request_timeout, Duration::from_secs(10));
        assert_eq!(options.failure_policy, FailurePolicy::Lenient);
        assert_eq!(options.api_base, DEFAULT_API_BASE);
        assert_eq!(options.token_url, DEFAULT_TOKEN_URL);
    }

    #[test]
    fn test_limit_is_clamped() {
        let (_dir, config) = load_with(CREDENTIALS);

        config.set_spotify_limit(0).unwrap();
        assert_eq!(config.get_spotify_limit().unwrap().get(), 1);

        config.set_spotify_limit(100).unwrap();
        assert_eq!(config.get_spotify_limit().unwrap().get(), 50);

        config
            .set_value(&path("limit"), Value::String("12".into()))
            .unwrap();
        assert_eq!(config.get_spotify_limit().unwrap().get(), 12);

        config
            .set_value(&path("limit"), Value::String("many".into()))
            .unwrap();
        assert!(config.get_spotify_limit().is_err());
    }

    #[test]
    fn test_time_range_and_policy() {
        let (_dir, config) = load_with(CREDENTIALS);

        config.set_spotify_time_range(TimeRange::LongTerm).unwrap();
        config.set_spotify_failure_policy(FailurePolicy::Strict).unwrap();
        let options = config.spotify_options().unwrap();
        assert_eq!(options.time_range, TimeRange::LongTerm);
        assert_eq!(options.failure_policy, FailurePolicy::Strict);

        config
            .set_value(&path("time_range"), Value::String("all_time".into()))
            .unwrap();
        assert!(config.spotify_options().is_err());
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let (_dir, config) = load_with(CREDENTIALS);
        config.set_spotify_cache_ttl(0).unwrap();
        let err = config.spotify_options().unwrap_err();
        assert!(err.to_string().contains("cache_ttl"));
    }

    #[test]
    fn test_with_env_fallback_prefers_config() {
        assert_eq!(
            with_env_fallback(Some("from-config".into()), "PMOSPOTIFY_TEST_UNSET_VAR"),
            Some("from-config".to_string())
        );
        assert_eq!(
            with_env_fallback(None, "PMOSPOTIFY_TEST_UNSET_VAR"),
            None
        );
    }

    #[test]
    fn test_plain_secrets_are_read_back() {
        let (_dir, config) = load_with(
            "sources:\n  spotify:\n    client_secret: plain-secret\n    refresh_token: plain-token\n",
        );
        assert_eq!(
            config.get_spotify_client_secret().unwrap().as_deref(),
            Some("plain-secret")
        );
        assert_eq!(
            config.get_spotify_refresh_token().unwrap().as_deref(),
            Some("plain-token")
        );
    }
}
