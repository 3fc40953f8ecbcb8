//! Bulk current-weather endpoint.
//!
//! - POST /api/v1/weather/bulk  `{"cities": [..]}`

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};

use crate::app::AppState;
use crate::envelope::{build_error, ApiResponse, ResponseEnvelope};
use crate::middleware::RequestCorrelation;
use crate::services::pipeline;

fn is_json_request(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .is_some_and(|mime| {
            mime.eq_ignore_ascii_case("application/json")
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
}

/// Current weather for up to ten cities in one request.
///
/// Per-city failures are collected into `errors`; the request as a whole
/// still succeeds. Bulk responses are not cached.
#[utoipa::path(
    post,
    path = "/api/v1/weather/bulk",
    tag = "Weather",
    request_body(
        content = serde_json::Value,
        description = "`{\"cities\": [\"London\", \"Paris\"]}`, at most ten entries",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Per-city results and errors", body = ResponseEnvelope),
        (status = 400, description = "Missing, empty or oversized city list", body = ResponseEnvelope),
        (status = 429, description = "Rate limit exceeded", body = ResponseEnvelope),
    )
)]
pub async fn get_bulk_weather(
    State(state): State<AppState>,
    RequestCorrelation(request_id): RequestCorrelation,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResponse {
    if !is_json_request(&headers) {
        return build_error(
            StatusCode::BAD_REQUEST,
            "Content-Type must be application/json",
            None,
            &request_id,
        );
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::info!(request_id = %request_id, "Rejected bulk body: {}", e);
            return build_error(
                StatusCode::BAD_REQUEST,
                "Request body is not valid JSON",
                None,
                &request_id,
            );
        }
    };

    pipeline::bulk_weather(&state, &payload, &request_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::routes::test_support::{post_json, send, test_router};
    use crate::services::transform::fixtures;

    const BULK: &str = "/api/v1/weather/bulk";

    #[test]
    fn test_is_json_request() {
        let mut headers = HeaderMap::new();
        assert!(!is_json_request(&headers));
        headers.insert(CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(is_json_request(&headers));
        headers.insert(CONTENT_TYPE, "application/problem+json".parse().unwrap());
        assert!(is_json_request(&headers));
        headers.insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        assert!(!is_json_request(&headers));
    }

    #[tokio::test]
    async fn test_bulk_partial_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::current_weather("London")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "NotARealCityXYZ123"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        let app = test_router(&server);

        let (status, headers, body) = send(
            &app,
            post_json(BULK, serde_json::json!({"cities": ["London", "NotARealCityXYZ123"]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["success_count"], 1);
        assert_eq!(body["data"]["error_count"], 1);
        assert_eq!(body["data"]["results"][0]["city"], "London");
        assert_eq!(
            body["data"]["errors"],
            serde_json::json!([{"city": "NotARealCityXYZ123", "error": "Location not found"}])
        );
        assert_eq!(headers["x-ratelimit-limit"], "10");
    }

    #[tokio::test]
    async fn test_bulk_keeps_input_order_and_invalid_entries() {
        let server = MockServer::start().await;
        for city in ["Paris", "Oslo"] {
            Mock::given(method("GET"))
                .and(path("/weather"))
                .and(query_param("q", city))
                .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::current_weather(city)))
                .mount(&server)
                .await;
        }
        let app = test_router(&server);

        let (status, _, body) = send(
            &app,
            post_json(BULK, serde_json::json!({"cities": ["Paris", 42, "<script>", "Oslo"]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["results"][0]["city"], "Paris");
        assert_eq!(body["data"]["results"][1]["city"], "Oslo");
        assert_eq!(
            body["data"]["errors"],
            serde_json::json!([
                {"city": 42, "error": "City name is required"},
                {"city": "<script>", "error": "Invalid characters in city name"}
            ])
        );
    }

    #[tokio::test]
    async fn test_bulk_all_cities_failing_is_still_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Atlantis"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Berlin"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let app = test_router(&server);

        let (status, _, body) = send(
            &app,
            post_json(BULK, serde_json::json!({"cities": ["Atlantis", "<x>", "Berlin"]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["error"].is_null());
        assert_eq!(body["data"]["results"], serde_json::json!([]));
        assert_eq!(body["data"]["success_count"], 0);
        assert_eq!(body["data"]["error_count"], 3);
        assert_eq!(
            body["data"]["errors"],
            serde_json::json!([
                {"city": "Atlantis", "error": "Location not found"},
                {"city": "<x>", "error": "Invalid characters in city name"},
                {"city": "Berlin", "error": "Unable to fetch weather data"}
            ])
        );
    }

    #[tokio::test]
    async fn test_bulk_rejects_more_than_ten_cities() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let app = test_router(&server);

        let cities: Vec<String> = (0..11).map(|i| format!("City{}", i)).collect();
        let (status, _, body) = send(&app, post_json(BULK, serde_json::json!({ "cities": cities }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Maximum 10 cities allowed per request");
    }

    #[tokio::test]
    async fn test_bulk_requires_city_list() {
        let server = MockServer::start().await;
        let app = test_router(&server);

        let (status, _, body) = send(&app, post_json(BULK, serde_json::json!({"cities": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Cities array is required");
    }

    #[tokio::test]
    async fn test_bulk_requires_json_content_type() {
        let server = MockServer::start().await;
        let app = test_router(&server);

        let req = Request::builder()
            .method("POST")
            .uri(BULK)
            .header("content-type", "text/plain")
            .body(Body::from(r#"{"cities": ["London"]}"#))
            .unwrap();
        let (status, _, body) = send(&app, req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Content-Type must be application/json");
    }

    #[tokio::test]
    async fn test_bulk_rejects_invalid_json() {
        let server = MockServer::start().await;
        let app = test_router(&server);

        let req = Request::builder()
            .method("POST")
            .uri(BULK)
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Request body is not valid JSON");
    }

    #[tokio::test]
    async fn test_bulk_oversized_body_is_413_envelope() {
        let server = MockServer::start().await;
        let app = test_router(&server);

        let padding = "x".repeat(1024 * 1024 + 1);
        let (status, _, body) = send(
            &app,
            post_json(BULK, serde_json::json!({"cities": ["London"], "padding": padding})),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], 413);
    }

    #[tokio::test]
    async fn test_get_on_bulk_is_405_envelope() {
        let server = MockServer::start().await;
        let app = test_router(&server);

        let (status, headers, body) = send(&app, crate::routes::test_support::get(BULK)).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"]["code"], 405);
        assert_eq!(
            body["error"]["message"],
            "The method is not allowed for the requested URL."
        );
        assert!(headers.contains_key("allow"));
    }
}
