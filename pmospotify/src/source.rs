//! The four sub-fetches as a trait
//!
//! The aggregator depends on `Arc<dyn SpotifySource>` rather than on the HTTP
//! client, so tests can substitute counting or failing sources.

use crate::client::SpotifyClient;
use crate::context::RequestContext;
use crate::error::Result;
use crate::models::{CurrentlyPlaying, RecentlyPlayed, TopArtists, TopTracks};
use async_trait::async_trait;

#[async_trait]
pub trait SpotifySource: Send + Sync {
    async fn fetch_currently_playing(&self, ctx: &RequestContext)
    -> Result<Option<CurrentlyPlaying>>;

    async fn fetch_top_artists(&self, ctx: &RequestContext) -> Result<Option<TopArtists>>;

    async fn fetch_top_tracks(&self, ctx: &RequestContext) -> Result<Option<TopTracks>>;

    async fn fetch_recently_played(&self, ctx: &RequestContext) -> Result<Option<RecentlyPlayed>>;
}

#[async_trait]
impl SpotifySource for SpotifyClient {
    async fn fetch_currently_playing(
        &self,
        ctx: &RequestContext,
    ) -> Result<Option<CurrentlyPlaying>> {
        SpotifyClient::fetch_currently_playing(self, ctx).await
    }

    async fn fetch_top_artists(&self, ctx: &RequestContext) -> Result<Option<TopArtists>> {
        SpotifyClient::fetch_top_artists(self, ctx).await
    }

    async fn fetch_top_tracks(&self, ctx: &RequestContext) -> Result<Option<TopTracks>> {
        SpotifyClient::fetch_top_tracks(self, ctx).await
    }

    async fn fetch_recently_played(&self, ctx: &RequestContext) -> Result<Option<RecentlyPlayed>> {
        SpotifyClient::fetch_recently_played(self, ctx).await
    }
}
