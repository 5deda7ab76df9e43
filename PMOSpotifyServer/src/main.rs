use anyhow::{Context, bail};
use pmoconfig::get_config;
use pmoserver::{LoggingOptions, ServerBuilder};
use pmospotify::{RequestContext, SpotifyClient, SpotifyConfigExt, SpotifyServerExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const STARTUP_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Configuration et logs ==========
    let config = get_config();

    let mut server = ServerBuilder::new_configured()?.build();
    server.init_logging(LoggingOptions::from_config(&config)).await?;

    info!("📁 Configuration loaded from {}", config.dir());

    // ========== PHASE 2 : Client Spotify ==========
    info!("🎵 Loading Spotify settings...");
    let options = config
        .spotify_options()
        .context("Invalid Spotify configuration")?;

    let client = SpotifyClient::from_options(&options)?;

    // Un refresh token révoqué ne se répare pas tout seul : on s'arrête
    let ctx = RequestContext::with_timeout(STARTUP_CHECK_TIMEOUT);
    if let Err(e) = client.verify_credentials(&ctx).await {
        error!("❌ Spotify rejected the configured credentials: {}", e);
        eprintln!(
            "Spotify authorization failed. Obtain a new refresh token with the \
             user-read-currently-playing, user-read-recently-played and user-top-read \
             scopes, then store it in sources.spotify.refresh_token or SPOTIFY_REFRESH_TOKEN."
        );
        bail!("Spotify authorization failed");
    }

    if options.cache_ttl < Duration::from_secs(30) {
        warn!(
            "⚠️ Cache TTL of {}s may exceed Spotify rate limits",
            options.cache_ttl.as_secs()
        );
    }

    server
        .init_spotify_with_source(Arc::new(client), &options)
        .await?;

    // ========== PHASE 3 : Démarrage du serveur ==========
    info!("🌐 Starting HTTP server...");
    let addr = server.start().await?;

    info!("✅ PMOSpotify is ready on http://{}", addr);
    info!("Press Ctrl+C to stop...");
    server.wait().await
}
