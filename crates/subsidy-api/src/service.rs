//! Subsidy API service: router assembly and server lifecycle.

use crate::config::{ApiConfig, ConfigError};
use crate::middleware::{create_cors_layer, TimeoutLayer, TracingLayer};
use crate::routes::{self, health, AppState};
use axum::{routing::get, Router};
use ledger_gateway::ConnectionManager;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

/// Server lifecycle failures
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// HTTP surface over a shared [`ConnectionManager`]
pub struct SubsidyApiService {
    config: ApiConfig,
    connections: Arc<ConnectionManager>,
}

impl SubsidyApiService {
    /// Create the service. The connection manager may still be uninitialized.
    pub fn new(config: ApiConfig, connections: Arc<ConnectionManager>) -> Result<Self, ServiceError> {
        config.validate()?;
        Ok(Self {
            config,
            connections,
        })
    }

    pub fn router(&self) -> Router {
        build_router(&self.config, Arc::clone(&self.connections))
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServiceError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServiceError::Bind { addr, source })?;

        info!(
            %addr,
            ledger_ready = self.connections.is_ready(),
            "Subsidy API listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServiceError::Serve)?;

        info!("Subsidy API stopped");
        Ok(())
    }
}

/// Build the full HTTP router with its middleware stack.
pub fn build_router(config: &ApiConfig, connections: Arc<ConnectionManager>) -> Router {
    let state = AppState::new(connections, config.limits.max_events_limit);

    let middleware = ServiceBuilder::new()
        .layer(create_cors_layer(&config.cors))
        .layer(TracingLayer::new())
        .layer(TimeoutLayer::new(config.timeouts.request));

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .nest("/api/subsidy", routes::subsidy::router())
        .nest("/api/contract", routes::contract::router())
        .fallback(health::not_found)
        .layer(RequestBodyLimitLayer::new(config.limits.max_request_size))
        .layer(middleware)
        .with_state(state)
}
