use axum::Json;
use serde::Serialize;

use crate::version::{build_info, BuildInfo, OUROVEON_FORMAT_VERSION};

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    /// one-line rendering of `build`
    pub summary: String,
    pub archive_format: &'static str,
    pub build: BuildInfo,
}

pub async fn handler() -> Json<VersionResponse> {
    let build = build_info();
    tracing::debug!(%build, "version requested");
    Json(VersionResponse {
        summary: build.to_string(),
        archive_format: OUROVEON_FORMAT_VERSION,
        build,
    })
}
