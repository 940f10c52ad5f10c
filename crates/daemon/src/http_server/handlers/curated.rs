use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::store::DocumentStore;

use crate::public_jams::CacheError;
use crate::service_state::ServiceState;

/// The curated public jams with their newest riffs, all from the same
///  refresh pass
pub async fn handler<S: DocumentStore>(State(state): State<ServiceState<S>>) -> Response {
    match state.public_jams().snapshot().await {
        Ok(jams) => {
            let body = serde_json::json!({ "ok": true, "data": jams });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => handle_error(e),
    }
}

fn handle_error(err: CacheError) -> Response {
    tracing::warn!(error = %err, "curated jam list unavailable");
    let body = serde_json::json!({ "ok": false, "error": err.to_string() });
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}
