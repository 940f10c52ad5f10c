use axum::routing::get;
use axum::Router;

use common::store::DocumentStore;

use crate::service_state::ServiceState;

mod data_source;
mod liveness;
mod readiness;
mod version;

pub use data_source::{DataSource, DataSourceError, StateDataSource};

pub fn router<S: DocumentStore>(state: ServiceState<S>) -> Router<ServiceState<S>> {
    Router::new()
        .route("/livez", get(liveness::handler))
        .route("/readyz", get(readiness::handler))
        .route("/version", get(version::handler))
        .with_state(state)
}
