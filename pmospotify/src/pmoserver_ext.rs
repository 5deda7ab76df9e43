//! Extension pmoserver pour Spotify
//!
//! Ce module fournit un trait d'extension pour ajouter les routes `/` et
//! `/api` à un serveur pmoserver, sans que pmoserver dépende de pmospotify.

use crate::api_rest::SpotifyState;
use crate::options::SpotifyOptions;
use crate::source::SpotifySource;
use anyhow::Result;
use std::sync::Arc;

/// Trait pour étendre pmoserver avec le service Spotify
///
/// # Exemple
///
/// ```rust,no_run
/// use pmoconfig::get_config;
/// use pmoserver::ServerBuilder;
/// use pmospotify::{SpotifyConfigExt, SpotifyServerExt};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let options = get_config().spotify_options()?;
///     let mut server = ServerBuilder::new_configured()?.build();
///
///     server.init_spotify(options).await?;
///
///     server.start().await?;
///     server.wait().await
/// }
/// ```
pub trait SpotifyServerExt {
    /// Crée le client, l'agrégateur et le cache, puis enregistre les routes
    ///
    /// # Routes enregistrées
    ///
    /// - `GET /` - Bannière texte
    /// - `GET /api` - Snapshot JSON
    async fn init_spotify(&mut self, options: SpotifyOptions) -> Result<Arc<SpotifyState>>;

    /// Comme [`SpotifyServerExt::init_spotify`], avec une source déjà construite
    async fn init_spotify_with_source(
        &mut self,
        source: Arc<dyn SpotifySource>,
        options: &SpotifyOptions,
    ) -> Result<Arc<SpotifyState>>;
}
