//! Forecast HTTP endpoint.
//!
//! - GET /api/v1/forecast/:city

use axum::extract::{Path, State};
use axum::http::Uri;

use crate::app::AppState;
use crate::envelope::{ApiResponse, ResponseEnvelope};
use crate::middleware::RequestCorrelation;
use crate::services::pipeline::{self, cache_key, with_cache, FORECAST_TTL};

/// Daily forecast for a city, up to five days.
///
/// One entry per local calendar date, taken from the first 3-hour interval
/// of that date. Responses are cached for ten minutes per path.
#[utoipa::path(
    get,
    path = "/api/v1/forecast/{city}",
    tag = "Forecast",
    params(
        ("city" = String, Path, description = "City name")
    ),
    responses(
        (status = 200, description = "Daily forecast", body = ResponseEnvelope),
        (status = 400, description = "Invalid city or location not found", body = ResponseEnvelope),
        (status = 429, description = "Rate limit exceeded", body = ResponseEnvelope),
        (status = 500, description = "Weather service unavailable", body = ResponseEnvelope),
    )
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    RequestCorrelation(request_id): RequestCorrelation,
    uri: Uri,
    Path(city): Path<String>,
) -> ApiResponse {
    let key = cache_key("get_forecast", &uri);
    with_cache(&state, key, FORECAST_TTL, || {
        pipeline::forecast_by_city(&state, &city, &request_id)
    })
    .await
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::routes::test_support::{get, send, test_router};
    use crate::services::transform::fixtures;

    #[tokio::test]
    async fn test_get_forecast_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("q", "London"))
            .and(query_param("cnt", "40"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::forecast(fixtures::OBSERVED_AT, 40)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let app = test_router(&server);

        let (status, headers, body) = send(&app, get("/api/v1/forecast/London")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["city"], "London");
        assert_eq!(body["data"]["country"], "GB");
        let days = body["data"]["forecast"].as_array().unwrap();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0]["temperature"]["average"], 0);
        assert_eq!(headers["x-ratelimit-limit"], "20");

        // Second request is served from the cache.
        let (status, _, again) = send(&app, get("/api/v1/forecast/London")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["timestamp"], body["timestamp"]);
    }

    #[tokio::test]
    async fn test_get_forecast_unknown_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let app = test_router(&server);

        let (status, _, body) = send(&app, get("/api/v1/forecast/Atlantis")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Location not found");
    }

    #[tokio::test]
    async fn test_get_forecast_malformed_document_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"cod": "200"})))
            .mount(&server)
            .await;
        let app = test_router(&server);

        let (status, _, body) = send(&app, get("/api/v1/forecast/London")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An unexpected error occurred");
    }
}
