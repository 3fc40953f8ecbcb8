use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Paths of the public endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointIndex {
    pub health: String,
    pub weather: String,
    pub weather_by_coords: String,
    pub forecast: String,
    pub bulk_weather: String,
}

/// Service descriptor returned by `GET /`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceIndex {
    pub service: String,
    pub version: String,
    pub endpoints: EndpointIndex,
}

/// List the service's endpoints.
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses(
        (status = 200, description = "Service descriptor", body = ServiceIndex),
    )
)]
pub async fn index() -> Json<ServiceIndex> {
    Json(ServiceIndex {
        service: "Weather API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: EndpointIndex {
            health: "/health".to_string(),
            weather: "/api/v1/weather/{city}".to_string(),
            weather_by_coords: "/api/v1/weather/coordinates?lat={lat}&lon={lon}".to_string(),
            forecast: "/api/v1/forecast/{city}".to_string(),
            bulk_weather: "/api/v1/weather/bulk".to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use wiremock::MockServer;

    use crate::routes::test_support::{get, send, test_router};

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let server = MockServer::start().await;
        let app = test_router(&server);

        let (status, headers, body) = send(&app, get("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "Weather API");
        assert_eq!(body["endpoints"]["bulk_weather"], "/api/v1/weather/bulk");
        assert_eq!(headers["x-ratelimit-limit"], "100");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404_envelope() {
        let server = MockServer::start().await;
        let app = test_router(&server);

        let (status, headers, body) = send(&app, get("/api/v1/nothing-here")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], 404);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("The requested URL was not found on the server."));
        assert_eq!(body["request_id"], headers["x-request-id"].to_str().unwrap());
    }
}
