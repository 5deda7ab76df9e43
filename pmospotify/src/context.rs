//! Request-scoped deadline and cancellation
//!
//! Every inbound `/api` request creates one [`RequestContext`]. The four
//! upstream fetches of a refresh run under that context, so when the deadline
//! expires or the server shuts down all of them are dropped together.

use crate::error::{Result, SpotifyError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    token: CancellationToken,
}

impl RequestContext {
    /// Context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            token: CancellationToken::new(),
        }
    }

    /// Context expiring `timeout` from now, also cancelled with `shutdown`
    ///
    /// Cancelling the context itself never reaches `shutdown`.
    pub fn with_shutdown(timeout: Duration, shutdown: &CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            token: shutdown.child_token(),
        }
    }

    /// Time left before the deadline, zero once expired
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Runs `fut` until it completes, the context is cancelled or the deadline passes
    ///
    /// On cancellation or expiry `fut` is dropped, which aborts any in-flight
    /// request it owns.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SpotifyError::Cancelled),
            res = tokio::time::timeout_at(self.deadline, fut) => match res {
                Ok(out) => out,
                Err(_) => Err(SpotifyError::Timeout),
            },
        }
    }
}
