//! Current-weather HTTP endpoints.
//!
//! - GET /api/v1/weather/:city
//! - GET /api/v1/weather/coordinates?lat=..&lon=..

use axum::extract::{Path, Query, State};
use axum::http::Uri;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::envelope::{ApiResponse, ResponseEnvelope};
use crate::middleware::RequestCorrelation;
use crate::services::pipeline::{self, cache_key, with_cache, CURRENT_WEATHER_TTL};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CoordinatesQuery {
    /// Latitude in decimal degrees, -90..=90
    pub lat: Option<String>,
    /// Longitude in decimal degrees, -180..=180
    pub lon: Option<String>,
}

/// Current weather for a city.
///
/// Responses are cached for five minutes per path.
#[utoipa::path(
    get,
    path = "/api/v1/weather/{city}",
    tag = "Weather",
    params(
        ("city" = String, Path, description = "City name, optionally with country code (e.g. \"London,GB\")")
    ),
    responses(
        (status = 200, description = "Current conditions", body = ResponseEnvelope),
        (status = 400, description = "Invalid city or location not found", body = ResponseEnvelope),
        (status = 429, description = "Rate limit exceeded", body = ResponseEnvelope),
        (status = 500, description = "Weather service unavailable", body = ResponseEnvelope),
    )
)]
pub async fn get_weather(
    State(state): State<AppState>,
    RequestCorrelation(request_id): RequestCorrelation,
    uri: Uri,
    Path(city): Path<String>,
) -> ApiResponse {
    let key = cache_key("get_weather", &uri);
    with_cache(&state, key, CURRENT_WEATHER_TTL, || {
        pipeline::current_weather_by_city(&state, &city, &request_id)
    })
    .await
}

/// Current weather for a coordinate pair.
#[utoipa::path(
    get,
    path = "/api/v1/weather/coordinates",
    tag = "Weather",
    params(CoordinatesQuery),
    responses(
        (status = 200, description = "Current conditions", body = ResponseEnvelope),
        (status = 400, description = "Missing or out-of-range coordinates", body = ResponseEnvelope),
        (status = 429, description = "Rate limit exceeded", body = ResponseEnvelope),
        (status = 500, description = "Weather service unavailable", body = ResponseEnvelope),
    )
)]
pub async fn get_weather_by_coordinates(
    State(state): State<AppState>,
    RequestCorrelation(request_id): RequestCorrelation,
    uri: Uri,
    Query(query): Query<CoordinatesQuery>,
) -> ApiResponse {
    let key = cache_key("get_weather_by_coordinates", &uri);
    with_cache(&state, key, CURRENT_WEATHER_TTL, || {
        pipeline::current_weather_by_coordinates(
            &state,
            query.lat.as_deref(),
            query.lon.as_deref(),
            &request_id,
        )
    })
    .await
}
