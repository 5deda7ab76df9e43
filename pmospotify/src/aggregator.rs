//! Concurrent fan-out of the four sub-fetches into one [`Snapshot`]

use crate::context::RequestContext;
use crate::error::{Result, SpotifyError};
use crate::models::Snapshot;
use crate::source::SpotifySource;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a failed sub-fetch does to the whole snapshot
///
/// Expiry of the request context fails the snapshot under both policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// The failed field is null, the others are kept. Fails when a failure
    /// leaves every field null.
    #[default]
    Lenient,
    /// The first failure, in field order, fails the snapshot
    Strict,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailurePolicy::Lenient => "lenient",
            FailurePolicy::Strict => "strict",
        })
    }
}

impl FromStr for FailurePolicy {
    type Err = SpotifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(FailurePolicy::Lenient),
            "strict" => Ok(FailurePolicy::Strict),
            other => Err(SpotifyError::configuration(format!(
                "invalid failure_policy '{}', expected lenient or strict",
                other
            ))),
        }
    }
}

pub struct Aggregator {
    source: Arc<dyn SpotifySource>,
    policy: FailurePolicy,
}

impl Aggregator {
    pub fn new(source: Arc<dyn SpotifySource>, policy: FailurePolicy) -> Self {
        Self { source, policy }
    }

    /// Runs the four sub-fetches concurrently and merges their results
    ///
    /// Each fetch owns its result slot; the snapshot is assembled only once
    /// all four have completed. If `ctx` expires first, all pending fetches
    /// are dropped and the call fails with `Timeout` or `Cancelled`.
    pub async fn snapshot(&self, ctx: &RequestContext) -> Result<Snapshot> {
        let source = &self.source;
        let (top_artists, top_tracks, currently_playing, recently_played) = ctx
            .run(async {
                Ok(tokio::join!(
                    source.fetch_top_artists(ctx),
                    source.fetch_top_tracks(ctx),
                    source.fetch_currently_playing(ctx),
                    source.fetch_recently_played(ctx),
                ))
            })
            .await?;

        let mut failures: Vec<(&'static str, SpotifyError)> = Vec::new();
        let top_artists = settle("top_artists", top_artists, &mut failures);
        let top_tracks = settle("top_tracks", top_tracks, &mut failures);
        let currently_playing = settle("currently_playing", currently_playing, &mut failures);
        let recently_played = settle("recently_played", recently_played, &mut failures);

        // A sub-fetch that saw the deadline means the whole request is out of time
        if let Some(pos) = failures.iter().position(|(_, e)| e.is_context_error()) {
            return Err(failures.swap_remove(pos).1);
        }

        match self.policy {
            FailurePolicy::Strict if !failures.is_empty() => {
                let (field, err) = failures.remove(0);
                warn!(field = field, "Sub-fetch failed, strict policy aborts snapshot: {}", err);
                return Err(err);
            }
            // Nothing left but nulls: serving it would hide the failure for a whole TTL
            FailurePolicy::Lenient
                if !failures.is_empty()
                    && top_artists.is_none()
                    && top_tracks.is_none()
                    && currently_playing.is_none()
                    && recently_played.is_none() =>
            {
                warn!(failed = failures.len(), "No sub-fetch returned data");
                return Err(failures.remove(0).1);
            }
            _ => {}
        }

        for (field, err) in &failures {
            warn!(field = *field, "Sub-fetch failed, field set to null: {}", err);
        }

        let snapshot = Snapshot {
            top_artists,
            top_tracks,
            currently_playing,
            recently_played,
            captured_at: Utc::now(),
        };
        debug!(populated = snapshot.populated(), "Snapshot assembled");
        Ok(snapshot)
    }

    /// [`Aggregator::snapshot`] serialized as pretty-printed JSON
    pub async fn serialized_snapshot(&self, ctx: &RequestContext) -> Result<Vec<u8>> {
        let snapshot = self.snapshot(ctx).await?;
        Ok(serde_json::to_vec_pretty(&snapshot)?)
    }
}

fn settle<T>(
    field: &'static str,
    result: Result<Option<T>>,
    failures: &mut Vec<(&'static str, SpotifyError)>,
) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            failures.push((field, err));
            None
        }
    }
}
