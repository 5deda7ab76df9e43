//! # Module Server - API de haut niveau pour Axum
//!
//! Ce module fournit une abstraction simple pour monter des routes Axum,
//! appliquer les couches communes et démarrer le serveur.
//!
//! - 🎯 **Handlers avec état** : `add_handler_with_state()` et `add_router()`
//! - 🛡️ **Couches communes** : en-têtes de sécurité, CORS, traces HTTP
//! - ⚡ **Arrêt gracieux** : sur Ctrl+C ou via [`Server::shutdown`]

use crate::logs::{LogState, LoggingOptions, create_logs_router, init_logging};
use crate::middleware::{cors_layer, security_headers};
use anyhow::{Context, Result};
use axum::handler::Handler;
use axum::routing::get;
use axum::{Router, middleware};
use pmoconfig::get_config;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Serveur principal
pub struct Server {
    name: String,
    bind_address: String,
    http_port: u16,
    cors_origins: Vec<String>,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<Result<()>>>,
    shutdown: CancellationToken,
    log_state: Option<LogState>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `bind_address` - Adresse d'écoute (ex: "0.0.0.0")
    /// * `http_port` - Port HTTP à écouter, `0` pour un port éphémère
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            bind_address: bind_address.into(),
            http_port,
            cors_origins: Vec::new(),
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            shutdown: CancellationToken::new(),
            log_state: None,
        }
    }

    pub fn new_configured() -> Result<Self> {
        Ok(ServerBuilder::new_configured()?.build())
    }

    /// Ajoute un handler GET avec état
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route(path, get(handler)).with_state(state);

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).merge(route);
    }

    /// Ajoute un sous-router au serveur
    ///
    /// - Si `path` est "/", merge directement au router principal
    /// - Sinon, nest le router sous le chemin donné
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        let mut r = self.router.write().await;

        *r = if path == "/" {
            std::mem::take(&mut *r).merge(sub_router)
        } else {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            std::mem::take(&mut *r).nest(&normalized, sub_router)
        };
    }

    /// Router complet avec les couches communes
    ///
    /// Couches, de l'extérieur vers l'intérieur : traces, en-têtes de
    /// sécurité, CORS, routes.
    pub async fn app(&self) -> Router {
        self.router
            .read()
            .await
            .clone()
            .layer(cors_layer(&self.cors_origins))
            .layer(middleware::from_fn(security_headers))
            .layer(TraceLayer::new_for_http())
    }

    /// Démarre le serveur HTTP
    ///
    /// Le port est lié avant le retour, ce qui rend les erreurs de bind
    /// visibles immédiatement. Retourne l'adresse effectivement écoutée.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind_address, self.http_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr()?;
        info!("🚀 Server {} running at http://{}", self.name, local_addr);

        let app = self.app().await;
        let shutdown = self.shutdown.clone();

        // Ctrl+C déclenche l'arrêt gracieux
        let ctrl_c = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = signal::ctrl_c() => match res {
                    Ok(()) => {
                        info!("Ctrl+C reçu, arrêt gracieux");
                        ctrl_c.cancel();
                    }
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                },
                _ = ctrl_c.cancelled() => {}
            }
        });

        self.join_handle = Some(tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .context("HTTP server failed")
        }));

        Ok(local_addr)
    }

    /// Demande l'arrêt gracieux du serveur
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Jeton annulé à l'arrêt du serveur
    ///
    /// C'est un enfant du jeton interne : l'annuler n'arrête pas le serveur.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) -> Result<()> {
        match self.join_handle.take() {
            Some(h) => h.await.context("Server task panicked")?,
            None => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Initialise le système de logging
    ///
    /// Les routes `/log-sse`, `/log-dump` et `/log-setup` ne sont
    /// enregistrées que si `options.expose_http` est vrai.
    ///
    /// ```rust,no_run
    /// # use pmoserver::{ServerBuilder, logs::LoggingOptions};
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// let mut server = ServerBuilder::new_configured()?.build();
    /// server.init_logging(LoggingOptions::default()).await?;
    /// server.start().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn init_logging(&mut self, options: LoggingOptions) -> Result<()> {
        let expose_http = options.expose_http;
        let log_state = init_logging(options)?;

        if expose_http {
            self.add_router("/", create_logs_router(log_state.clone()))
                .await;
            info!("Log endpoints exposed on /log-dump, /log-sse and /log-setup");
        }

        self.log_state = Some(log_state);
        Ok(())
    }
}

/// Builder pattern
pub struct ServerBuilder {
    name: String,
    bind_address: String,
    http_port: u16,
    cors_origins: Vec<String>,
}

impl ServerBuilder {
    /// Crée un nouveau builder écoutant sur `0.0.0.0:8080`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
            cors_origins: Vec::new(),
        }
    }

    /// Reads the `host` section of the global configuration
    pub fn new_configured() -> Result<Self> {
        let config = get_config();
        Ok(Self::new("PMOSpotify")
            .bind_address(config.get_bind_address())
            .http_port(config.get_http_port())
            .cors_origins(config.get_cors_allowed_origins()?))
    }

    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Construit le serveur
    ///
    /// ```rust
    /// # use pmoserver::ServerBuilder;
    /// let server = ServerBuilder::new("MyAPI").http_port(3000).build();
    /// assert_eq!(server.name(), "MyAPI");
    /// ```
    pub fn build(self) -> Server {
        let mut server = Server::new(self.name, self.bind_address, self.http_port);
        server.cors_origins = self.cors_origins;
        server
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::extract::State;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn greet(State(name): State<String>) -> String {
        format!("hello {}", name)
    }

    #[tokio::test]
    async fn test_routes_and_layers() {
        let mut server = ServerBuilder::new("test").build();
        server
            .add_handler_with_state("/greet", greet, "spotify".to_string())
            .await;
        server
            .add_router("/nested", Router::new().route("/ping", get(|| async { "pong" })))
            .await;

        let app = server.app().await;

        let response = app
            .clone()
            .oneshot(Request::get("/greet").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello spotify");

        let response = app
            .oneshot(Request::get("/nested/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut server = ServerBuilder::new("test")
            .bind_address("127.0.0.1")
            .http_port(0)
            .build();

        let addr = server.start().await.unwrap();
        assert_ne!(addr.port(), 0);

        let token = server.shutdown_token();
        assert!(!token.is_cancelled());

        server.shutdown();
        server.wait().await.unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_shutdown_token_does_not_stop_server() {
        let server = ServerBuilder::new("test").build();
        server.shutdown_token().cancel();
        assert!(!server.shutdown.is_cancelled());
    }
}
