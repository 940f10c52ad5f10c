use axum::extract::State;
use axum::Json;
use serde::Serialize;

use common::store::DocumentStore;

use crate::service_state::ServiceState;

const STATUS_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: u32,
    pub awake: bool,
    /// unix milliseconds
    pub server_time: i64,
    pub most_recent_public_jam_change: i64,
    pub most_recent_public_jam_user: String,
    pub most_recent_public_jam_name: String,
}

/// Heartbeat for the studio client. Reads only the synopsis, so it
///  answers even while a refresh pass is running.
pub async fn handler<S: DocumentStore>(
    State(state): State<ServiceState<S>>,
) -> Json<StatusResponse> {
    let synopsis = state.public_jams().synopsis();
    Json(StatusResponse {
        version: STATUS_VERSION,
        awake: true,
        server_time: chrono::Utc::now().timestamp_millis(),
        most_recent_public_jam_change: synopsis.timestamp,
        most_recent_public_jam_user: synopsis.user,
        most_recent_public_jam_name: synopsis.jam_name,
    })
}
