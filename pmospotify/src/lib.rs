//! Spotify listening snapshot for PMOSpotify
//!
//! This crate serves a single JSON document describing a user's listening
//! activity, built from four Spotify Web API calls:
//!
//! - **Currently playing**: track and playback progress, or null
//! - **Top artists** and **top tracks** for a configured time range
//! - **Recently played** tracks, most recent first
//!
//! # Pipeline
//!
//! ```text
//! GET /api ─► SnapshotCache ──fresh──► cached bytes (copy)
//!                  │
//!                stale
//!                  ▼
//!             Aggregator ──► 4 × SpotifySource fetch (concurrent, one RequestContext)
//!                  │
//!                  ▼
//!          Snapshot ─► JSON ─► cache slot (atomic swap)
//! ```
//!
//! - [`SpotifyClient`] performs the authenticated GETs with a shared status
//!   policy and a bounded body size.
//! - [`Aggregator`] runs the four fetches concurrently under one deadline and
//!   applies the [`FailurePolicy`].
//! - [`SnapshotCache`] serves the last snapshot for its TTL and refreshes it
//!   at most once per stale period, whatever the number of concurrent requests.
//!
//! # Example
//!
//! ```no_run
//! use pmospotify::{
//!     Aggregator, Credentials, FailurePolicy, RequestContext, SnapshotCache, SpotifyClient,
//!     SpotifyOptions,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> pmospotify::Result<()> {
//!     let options = SpotifyOptions::new(Credentials::new("client-id", "client-secret", "refresh"));
//!     let client = SpotifyClient::from_options(&options)?;
//!
//!     let aggregator = Aggregator::new(Arc::new(client), FailurePolicy::Lenient);
//!     let cache = SnapshotCache::new(aggregator, options.cache_ttl);
//!
//!     let ctx = RequestContext::with_timeout(options.request_timeout);
//!     let snapshot = cache.get_or_refresh(&ctx).await?;
//!     println!("{}", String::from_utf8_lossy(&snapshot.bytes));
//!     Ok(())
//! }
//! ```
//!
//! # Configuration Extension
//!
//! With the `pmoconfig` feature (default), [`SpotifyConfigExt`] reads the
//! `sources.spotify` section of the PMOSpotify configuration and builds a
//! validated [`SpotifyOptions`].
//!
//! # Server Extension
//!
//! With the `pmoserver` feature (default), [`SpotifyServerExt`] wires the
//! client, aggregator and cache into a `pmoserver::Server`.

pub mod aggregator;
pub mod api_rest;
pub mod auth;
pub mod cache;
pub mod client;
pub mod context;
pub mod error;
pub mod models;
pub mod options;
pub mod source;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

#[cfg(feature = "pmoserver")]
pub mod pmoserver_ext;

#[cfg(feature = "pmoserver")]
mod pmoserver_impl;

pub use aggregator::{Aggregator, FailurePolicy};
pub use api_rest::{create_router, SpotifyState};
pub use auth::{Credentials, RefreshTokenProvider, StaticToken, TokenProvider};
pub use cache::{CachedSnapshot, SnapshotCache};
pub use client::{ClientBuilder, SpotifyClient};
pub use context::RequestContext;
pub use error::{Result, SpotifyError};
pub use models::{
    Artist, CurrentlyPlaying, Limit, RecentlyPlayed, Snapshot, TimeRange, TopArtists, TopTracks,
    Track,
};
pub use options::SpotifyOptions;
pub use source::SpotifySource;

#[cfg(feature = "pmoconfig")]
pub use config_ext::SpotifyConfigExt;

#[cfg(feature = "pmoserver")]
pub use pmoserver_ext::SpotifyServerExt;
