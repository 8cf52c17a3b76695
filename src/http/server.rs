//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with `/healthz` and any application routes
//! - Wire up middleware (request id, observability)
//! - Serve on a listener until the shutdown signal fires

use axum::{http::HeaderName, middleware, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::ServiceConfig;
use crate::health::{healthz, HealthAggregator, HealthState};
use crate::observability::{observe_request, RequestObserver};

/// Health endpoint path.
pub const HEALTHZ_PATH: &str = "/healthz";

const DEFAULT_LIVENESS_HEADER: &str = "liveness";

/// HTTP server hosting the health endpoint and application routes.
pub struct HttpServer {
    config: ServiceConfig,
    health: HealthState,
    observer: Arc<RequestObserver>,
    routes: Router,
}

impl HttpServer {
    /// Server with the default aggregator for `config`.
    pub fn new(config: ServiceConfig) -> Self {
        let health = HealthState::new(
            HealthAggregator::from_config(&config),
            liveness_header(&config),
        );
        let observer = Arc::new(RequestObserver::from_config(&config.observability));
        Self {
            config,
            health,
            observer,
            routes: Router::new(),
        }
    }

    /// Replace the health aggregator.
    pub fn with_aggregator(mut self, aggregator: HealthAggregator) -> Self {
        self.health = HealthState::new(aggregator, self.health.liveness_header.clone());
        self
    }

    /// Merge application routes; they share the observability stack.
    pub fn routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// The complete application, middleware included.
    pub fn router(&self) -> Router {
        let request_id = self.observer.request_id_header().clone();

        Router::new()
            .route(HEALTHZ_PATH, get(healthz))
            .with_state(self.health.clone())
            .merge(self.routes.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(middleware::from_fn_with_state(
                        self.observer.clone(),
                        observe_request,
                    )),
            )
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            base_url = %self.config.base_url(),
            "HTTP server starting"
        );

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

fn liveness_header(config: &ServiceConfig) -> HeaderName {
    HeaderName::try_from(config.observability.liveness_header.as_str())
        .unwrap_or_else(|_| HeaderName::from_static(DEFAULT_LIVENESS_HEADER))
}
