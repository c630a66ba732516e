mod response;
mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use response::{status_for, ApiError, Envelope};

use crate::config::Config;
use crate::extractor::{resolve, Credentials, Extractor};

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub extractor: Extractor,
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by the HTTP fetcher.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let extractor = Extractor::from_config(&config);
        Self::with_extractor(config, extractor)
    }

    /// State with a caller-supplied pipeline.
    #[must_use]
    pub fn with_extractor(config: Config, extractor: Extractor) -> Self {
        Self {
            extractor,
            config: Arc::new(config),
        }
    }

    /// Credentials for one request: its own cookies, else the configured ones.
    ///
    /// # Errors
    ///
    /// Returns `AuthMissing` when neither is present.
    pub fn credentials(&self, request_cookies: Option<&str>) -> crate::extractor::Result<Credentials> {
        resolve(
            request_cookies,
            self.config.default_cookies.as_deref(),
            self.config.proxy().as_ref(),
        )
    }
}

/// Start the web server and run until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address is invalid or the listener cannot bind.
pub async fn serve<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", config.listen_host, config.listen_port)
        .parse()
        .context("Invalid listen address")?;

    let app = create_app(AppState::new(config));

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind HTTP server")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    Ok(())
}

/// Build the router with middleware applied.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
