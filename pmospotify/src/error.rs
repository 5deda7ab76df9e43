//! Error types for the Spotify client and aggregation pipeline

/// Result type alias for Spotify operations
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Errors that can occur while fetching, aggregating or caching Spotify data
#[derive(Debug, thiserror::Error)]
pub enum SpotifyError {
    /// The access or refresh token was rejected (HTTP 401)
    ///
    /// Not retried: the operator has to re-run the authorization flow.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Upstream throttling (HTTP 429)
    #[error("Rate limited by Spotify API")]
    RateLimited,

    /// Upstream server error (HTTP 5xx)
    #[error("Spotify API unavailable (HTTP {status})")]
    UpstreamUnavailable { status: u16 },

    /// Body could not be decoded or exceeded the size cap
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Any other non-success status
    #[error("Unexpected HTTP status {code}")]
    UnexpectedStatus { code: u16 },

    /// The request context deadline expired
    #[error("Request timeout")]
    Timeout,

    /// The request context was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// Snapshot serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Missing or invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl SpotifyError {
    /// Maps a non-success HTTP status onto the error taxonomy
    pub fn from_status_code(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized("access token rejected".to_string()),
            429 => Self::RateLimited,
            s if s >= 500 => Self::UpstreamUnavailable { status: s },
            code => Self::UnexpectedStatus { code },
        }
    }

    /// Classifies a reqwest failure, keeping timeouts distinct from transport errors
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Request context expiry (`Timeout` or `Cancelled`)
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Timeout | Self::Cancelled)
    }

    /// Errors worth retrying on a later request
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::UpstreamUnavailable { .. } | Self::Timeout | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_policy() {
        assert!(SpotifyError::from_status_code(401).is_auth_error());
        assert!(SpotifyError::from_status_code(429).is_rate_limit());
        assert!(matches!(
            SpotifyError::from_status_code(503),
            SpotifyError::UpstreamUnavailable { status: 503 }
        ));
        assert!(matches!(
            SpotifyError::from_status_code(500),
            SpotifyError::UpstreamUnavailable { status: 500 }
        ));
        assert!(matches!(
            SpotifyError::from_status_code(404),
            SpotifyError::UnexpectedStatus { code: 404 }
        ));
        assert!(matches!(
            SpotifyError::from_status_code(202),
            SpotifyError::UnexpectedStatus { code: 202 }
        ));
    }

    #[test]
    fn test_classification() {
        assert!(SpotifyError::Timeout.is_context_error());
        assert!(SpotifyError::Cancelled.is_context_error());
        assert!(!SpotifyError::RateLimited.is_context_error());

        assert!(SpotifyError::RateLimited.is_transient());
        assert!(SpotifyError::UpstreamUnavailable { status: 502 }.is_transient());
        assert!(!SpotifyError::Cancelled.is_transient());
        assert!(!SpotifyError::Unauthorized("x".into()).is_transient());
        assert!(!SpotifyError::malformed("bad json").is_transient());
    }
}
