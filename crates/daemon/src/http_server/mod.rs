use axum::routing::get;
use axum::Router;
use http::header::{ACCEPT, ORIGIN};
use http::Method;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

use common::store::DocumentStore;

mod config;
mod handlers;
mod health;

pub use config::Config;
pub use health::{DataSource, DataSourceError, StateDataSource};

use crate::service_state::ServiceState;

const STATUS_PREFIX: &str = "/_status";

/// Routes the studio client polls, plus the status probes
pub fn router<S: DocumentStore>(state: ServiceState<S>, log_level: tracing::Level) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let public_cors = CorsLayer::new()
        .allow_methods(vec![Method::GET])
        .allow_headers(vec![ACCEPT, ORIGIN])
        .allow_origin(Any)
        .allow_credentials(false);

    let public_routes = Router::new()
        .route("/jam/curated", get(handlers::curated::handler::<S>))
        .route("/cosm/v1/status", get(handlers::status::handler::<S>))
        .route("/cosm/v1/manifest", get(handlers::manifest::handler::<S>))
        .layer(public_cors);

    Router::new()
        .nest(STATUS_PREFIX, health::router(state.clone()))
        .merge(public_routes)
        .fallback(handlers::not_found_handler)
        .with_state(state)
        .layer(trace_layer)
}

pub async fn run<S: DocumentStore>(
    config: Config,
    state: ServiceState<S>,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listen_addr = config.listen_addr;
    let router = router(state, config.log_level);

    tracing::info!(addr = ?listen_addr, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
