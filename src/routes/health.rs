use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy", or "degraded" when the weather provider is unreachable
    pub status: String,
    /// Service name
    pub service: String,
    /// API version
    pub version: String,
    /// UTC time of the check (ISO 8601)
    pub timestamp: String,
    /// "available" when the provider answered the probe with 200
    pub weather_api: String,
}

/// Health check endpoint.
///
/// Probes the weather provider with a fixed query. A provider that cannot
/// be reached makes the service "degraded" (503); a provider that answers
/// with a non-200 status only marks `weather_api` as unavailable.
/// Not rate limited.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Weather provider unreachable", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let probe = state.weather_client.ping().await;

    let reachable = probe.is_some();
    let available = probe == Some(reqwest::StatusCode::OK);

    let status = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if reachable { "healthy" } else { "degraded" }.to_string(),
            service: "weather-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            weather_api: if available { "available" } else { "unavailable" }.to_string(),
        }),
    )
}
