use axum::extract::State;
use axum::Json;
use serde::Serialize;

use common::store::DocumentStore;

use crate::config::ManifestEntry;
use crate::service_state::ServiceState;

#[derive(Debug, Serialize)]
pub struct ManifestResponse {
    pub count: usize,
    pub data: Vec<ManifestEntry>,
}

/// Ids and names of every hosted jam
#[tracing::instrument(skip(state))]
pub async fn handler<S: DocumentStore>(
    State(state): State<ServiceState<S>>,
) -> Json<ManifestResponse> {
    let data = state.jams().to_vec();
    Json(ManifestResponse {
        count: data.len(),
        data,
    })
}
