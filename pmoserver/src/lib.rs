//! # pmoserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate fournit une abstraction simple pour créer des serveurs HTTP avec
//! Axum : enregistrement de routes avec état, couches communes et logging.
//!
//! ## Fonctionnalités
//!
//! - 🚀 **API de haut niveau** : `ServerBuilder` / `Server` au-dessus d'Axum
//! - 🛡️ **Middleware** : en-têtes de sécurité, CORS, `TraceLayer`
//! - 📡 **Server-Sent Events (SSE)** : logs en temps réel, activables par configuration
//! - ⚡ **Arrêt gracieux** : gestion propre de l'arrêt sur Ctrl+C
//!
//! ## Architecture
//!
//! - [`server`] : serveur principal et builder
//! - [`middleware`] : couches HTTP communes
//! - [`logs`] : subscriber tracing, buffer circulaire et endpoints de logs
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use pmoserver::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new("MyServer").http_port(8080).build();
//!     server.init_logging(LoggingOptions::default()).await?;
//!
//!     server
//!         .add_router("/", Router::new().route("/status", get(|| async { "ok" })))
//!         .await;
//!
//!     server.start().await?;
//!     server.wait().await
//! }
//! ```

pub mod logs;
pub mod middleware;
pub mod server;

pub use logs::{LogState, LoggingOptions, SseLayer, log_dump, log_sse};
pub use server::{Server, ServerBuilder};
