//! Request pipeline: validate → cache lookup → upstream → transform →
//! cache store → envelope.
//!
//! Every entry point returns an [`ApiResponse`]; failures are recovered here
//! and turned into error envelopes, never propagated to the router.

use std::future::Future;
use std::time::Duration;

use axum::http::{StatusCode, Uri};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::envelope::{build_error, build_error_from, build_success, ApiResponse};
use crate::errors::AppError;
use crate::services::openweather::{Operation, WeatherClient};
use crate::services::transform::{to_forecast_report, to_weather_report, WeatherReport};
use crate::services::validation::{validate_city, validate_city_value, validate_coordinates};

/// Cache TTL for current-weather lookups.
pub const CURRENT_WEATHER_TTL: Duration = Duration::from_secs(300);
/// Cache TTL for forecast lookups.
pub const FORECAST_TTL: Duration = Duration::from_secs(600);
/// Maximum number of cities in one bulk request.
pub const MAX_BULK_CITIES: usize = 10;
/// Number of 3-hour intervals requested from the provider for a forecast.
const FORECAST_INTERVALS: u32 = 40;

/// Per-city failure in a bulk lookup.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BulkError {
    /// The city as submitted (or as normalized, if it passed validation)
    #[schema(value_type = Object)]
    pub city: serde_json::Value,
    /// Error message for this city
    pub error: String,
}

/// Bulk lookup result, partitioned by outcome. Each partition keeps input order.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BulkResult {
    pub results: Vec<WeatherReport>,
    pub errors: Vec<BulkError>,
    pub success_count: usize,
    pub error_count: usize,
}

/// Cache key for an endpoint: operation name + path + raw query string.
pub fn cache_key(endpoint: &str, uri: &Uri) -> String {
    format!("{}:{}:{}", endpoint, uri.path(), uri.query().unwrap_or(""))
}

/// Serve from the response cache, or compute and store the response.
///
/// Only 200 responses are stored. Bypassed entirely in debug mode.
pub async fn with_cache<F, Fut>(state: &AppState, key: String, ttl: Duration, compute: F) -> ApiResponse
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResponse>,
{
    if state.config.is_debug() {
        return compute().await;
    }

    if let Some(hit) = state.cache.get(&key).await {
        tracing::info!(cache_key = %key, "Cache hit");
        return hit;
    }

    let response = compute().await;
    if response.status == StatusCode::OK {
        state.cache.set(&key, response.clone(), ttl).await;
    }
    response
}

/// Log a pipeline failure and turn it into an error envelope.
fn respond_error(state: &AppState, err: &AppError, request_id: &str, context: &str) -> ApiResponse {
    if err.is_client_error() {
        tracing::info!(request_id, "{} rejected: {}", context, err);
    } else {
        tracing::error!(request_id, "Error {}: {}", context, err);
    }
    build_error_from(err, state.config.is_debug(), request_id)
}

fn respond<T: Serialize>(
    state: &AppState,
    result: Result<T, AppError>,
    request_id: &str,
    context: &str,
) -> ApiResponse {
    match result {
        Ok(data) => build_success(&data, request_id),
        Err(err) => respond_error(state, &err, request_id, context),
    }
}

/// Validate a city, fetch its current conditions and transform them.
async fn lookup_city(client: &WeatherClient, city: &str) -> Result<WeatherReport, AppError> {
    let raw = client
        .fetch(Operation::CurrentWeather, &[("q", city.to_string())])
        .await?;
    to_weather_report(&raw)
}

/// Current weather for a city name.
pub async fn current_weather_by_city(state: &AppState, raw_city: &str, request_id: &str) -> ApiResponse {
    let result = async {
        let city = validate_city(raw_city)?;
        lookup_city(&state.weather_client, &city).await
    }
    .await;
    respond(state, result, request_id, "fetching weather")
}

/// Current weather for a coordinate pair. Both parameters are required.
pub async fn current_weather_by_coordinates(
    state: &AppState,
    lat: Option<&str>,
    lon: Option<&str>,
    request_id: &str,
) -> ApiResponse {
    let (Some(lat), Some(lon)) = (
        lat.filter(|v| !v.is_empty()),
        lon.filter(|v| !v.is_empty()),
    ) else {
        return build_error(
            StatusCode::BAD_REQUEST,
            "Latitude and longitude are required",
            None,
            request_id,
        );
    };

    let result = async {
        let (lat, lon) = validate_coordinates(lat, lon)?;
        let raw = state
            .weather_client
            .fetch(
                Operation::CurrentWeather,
                &[("lat", lat.to_string()), ("lon", lon.to_string())],
            )
            .await?;
        to_weather_report(&raw)
    }
    .await;
    respond(state, result, request_id, "fetching weather by coordinates")
}

/// Multi-day forecast for a city name.
pub async fn forecast_by_city(state: &AppState, raw_city: &str, request_id: &str) -> ApiResponse {
    let result = async {
        let city = validate_city(raw_city)?;
        let raw = state
            .weather_client
            .fetch(
                Operation::Forecast,
                &[("q", city), ("cnt", FORECAST_INTERVALS.to_string())],
            )
            .await?;
        to_forecast_report(&raw)
    }
    .await;
    respond(state, result, request_id, "fetching forecast")
}

/// Extract the city list from a bulk request body.
pub fn parse_bulk_request(body: &serde_json::Value) -> Result<Vec<serde_json::Value>, AppError> {
    let cities = body
        .get("cities")
        .and_then(|c| c.as_array())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Cities array is required".to_string()))?;

    if cities.len() > MAX_BULK_CITIES {
        return Err(AppError::InvalidInput(format!(
            "Maximum {} cities allowed per request",
            MAX_BULK_CITIES
        )));
    }

    Ok(cities.clone())
}

/// Look up every city independently. One city's failure never affects the
/// others or the overall response, which is always 200.
pub async fn bulk_weather(state: &AppState, body: &serde_json::Value, request_id: &str) -> ApiResponse {
    let cities = match parse_bulk_request(body) {
        Ok(cities) => cities,
        Err(err) => return respond_error(state, &err, request_id, "bulk request"),
    };

    let debug = state.config.is_debug();
    let lookups = cities.into_iter().map(|raw| async move {
        let city = match validate_city_value(&raw) {
            Ok(city) => city,
            Err(err) => return Err((raw, err)),
        };
        lookup_city(&state.weather_client, &city)
            .await
            .map_err(|err| (serde_json::Value::String(city), err))
    });

    // join_all yields results in input order.
    let outcomes = futures::future::join_all(lookups).await;

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(report) => results.push(report),
            Err((city, err)) => {
                tracing::info!(request_id, city = %city, "Bulk lookup failed: {}", err);
                errors.push(BulkError {
                    city,
                    error: err.public_message(debug),
                });
            }
        }
    }

    build_success(
        &BulkResult {
            success_count: results.len(),
            error_count: errors.len(),
            results,
            errors,
        },
        request_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_includes_path_and_query() {
        let uri: Uri = "/api/v1/weather/coordinates?lat=1&lon=2".parse().unwrap();
        assert_eq!(
            cache_key("get_weather_by_coordinates", &uri),
            "get_weather_by_coordinates:/api/v1/weather/coordinates:lat=1&lon=2"
        );

        let uri: Uri = "/api/v1/weather/London".parse().unwrap();
        assert_eq!(cache_key("get_weather", &uri), "get_weather:/api/v1/weather/London:");
    }

    #[test]
    fn test_parse_bulk_request_accepts_list() {
        let body = serde_json::json!({"cities": ["London", "Paris"]});
        assert_eq!(parse_bulk_request(&body).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_bulk_request_rejects_bad_shapes() {
        for body in [
            serde_json::json!({}),
            serde_json::json!({"cities": []}),
            serde_json::json!({"cities": "London"}),
            serde_json::json!(["London"]),
            serde_json::json!(null),
        ] {
            let err = parse_bulk_request(&body).unwrap_err();
            assert_eq!(
                err,
                AppError::InvalidInput("Cities array is required".to_string()),
                "{} should be rejected",
                body
            );
        }
    }

    #[test]
    fn test_parse_bulk_request_rejects_more_than_ten() {
        let cities: Vec<String> = (0..11).map(|i| format!("City{}", i)).collect();
        let err = parse_bulk_request(&serde_json::json!({ "cities": cities })).unwrap_err();
        assert_eq!(
            err,
            AppError::InvalidInput("Maximum 10 cities allowed per request".to_string())
        );
    }

    #[test]
    fn test_bulk_result_serialization() {
        let result = BulkResult {
            results: vec![],
            errors: vec![BulkError {
                city: serde_json::json!("Atlantis"),
                error: "Location not found".to_string(),
            }],
            success_count: 0,
            error_count: 1,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "results": [],
                "errors": [{"city": "Atlantis", "error": "Location not found"}],
                "success_count": 0,
                "error_count": 1
            })
        );
    }
}
