//! Implémentation du trait SpotifyServerExt pour pmoserver::Server

use crate::aggregator::Aggregator;
use crate::api_rest::{SpotifyState, create_router};
use crate::cache::SnapshotCache;
use crate::client::SpotifyClient;
use crate::options::SpotifyOptions;
use crate::pmoserver_ext::SpotifyServerExt;
use crate::source::SpotifySource;
use anyhow::Result;
use pmoserver::Server;
use std::sync::Arc;
use tracing::info;

impl SpotifyServerExt for Server {
    async fn init_spotify(&mut self, options: SpotifyOptions) -> Result<Arc<SpotifyState>> {
        info!("Initializing Spotify API...");

        let client = SpotifyClient::from_options(&options)
            .map_err(|e| anyhow::anyhow!("Failed to create Spotify client: {}", e))?;

        self.init_spotify_with_source(Arc::new(client), &options)
            .await
    }

    async fn init_spotify_with_source(
        &mut self,
        source: Arc<dyn SpotifySource>,
        options: &SpotifyOptions,
    ) -> Result<Arc<SpotifyState>> {
        let aggregator = Aggregator::new(source, options.failure_policy);
        let cache = Arc::new(SnapshotCache::new(aggregator, options.cache_ttl));
        let state = SpotifyState::new(cache, options.request_timeout, self.shutdown_token());

        self.add_router("/", create_router(state.clone())).await;

        info!(
            ttl_secs = options.cache_ttl.as_secs(),
            policy = %options.failure_policy,
            limit = options.limit.get(),
            time_range = %options.time_range,
            "Spotify API initialized, endpoint available at /api"
        );

        Ok(Arc::new(state))
    }
}
