//! Shared state and the route table.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Method, Response, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::envelope;
use crate::errors::AppError;
use crate::middleware::{
    enforce_rate_limit, envelope_fallbacks, RateLimitPolicy, X_RATELIMIT_LIMIT,
    X_RATELIMIT_REMAINING,
};
use crate::routes;
use crate::services::cache::ResponseCache;
use crate::services::openweather::WeatherClient;
use crate::services::rate_limit::{Quota, RateLimiter};
use crate::services::{pipeline, transform};

/// Maximum accepted request body size (1 MiB).
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Per-route quotas.
const WEATHER_QUOTA: Quota = Quota::per_minute(30);
const FORECAST_QUOTA: Quota = Quota::per_minute(20);
const BULK_QUOTA: Quota = Quota::per_minute(10);
const DEFAULT_QUOTA: Quota = Quota::per_hour(100);

/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Facade API",
        description = "Current conditions and daily forecasts from OpenWeatherMap, \
            validated, reshaped and cached behind a uniform JSON envelope.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health and endpoint index"),
        (name = "Weather", description = "Current conditions by city, coordinates or in bulk"),
        (name = "Forecast", description = "Five-day daily forecast"),
    ),
    paths(
        routes::index::index,
        routes::health::health_check,
        routes::weather::get_weather,
        routes::weather::get_weather_by_coordinates,
        routes::forecast::get_forecast,
        routes::bulk::get_bulk_weather,
    ),
    components(
        schemas(
            envelope::ResponseEnvelope,
            envelope::ErrorBody,
            routes::health::HealthResponse,
            routes::index::ServiceIndex,
            routes::index::EndpointIndex,
            transform::WeatherReport,
            transform::ForecastReport,
            transform::DailyForecast,
            pipeline::BulkResult,
            pipeline::BulkError,
        )
    )
)]
pub struct ApiDoc;

/// Shared application state, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub weather_client: WeatherClient,
    pub cache: Arc<ResponseCache>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let weather_client = WeatherClient::new(&config)?;
        let cache = Arc::new(ResponseCache::new(&config.cache_key_prefix));
        Ok(Self {
            config: Arc::new(config),
            weather_client,
            cache,
            rate_limiter: Arc::new(RateLimiter::new()),
        })
    }

    fn policy(&self, scope: &'static str, quota: Quota) -> RateLimitPolicy {
        RateLimitPolicy::new(&self.rate_limiter, scope, quota)
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(X_RATELIMIT_LIMIT),
            HeaderName::from_static(X_RATELIMIT_REMAINING),
        ]);

    if config.allows_any_origin() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

fn request_span(req: &Request) -> tracing::Span {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("");
    tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = %request_id,
    )
}

fn cache_control(res: &Response<Body>) -> Option<HeaderValue> {
    (res.status() == StatusCode::OK).then(|| HeaderValue::from_static("public, max-age=300"))
}

/// Build the full router: route groups with their quotas, then the
/// cross-cutting layers (outermost last).
pub fn build_router(state: AppState) -> Router {
    let coordinates_routes = Router::new()
        .route(
            "/api/v1/weather/coordinates",
            get(routes::weather::get_weather_by_coordinates),
        )
        .route_layer(middleware::from_fn_with_state(
            state.policy("weather_by_coordinates", WEATHER_QUOTA),
            enforce_rate_limit,
        ))
        .with_state(state.clone());

    let weather_routes = Router::new()
        .route("/api/v1/weather/:city", get(routes::weather::get_weather))
        .route_layer(middleware::from_fn_with_state(
            state.policy("weather", WEATHER_QUOTA),
            enforce_rate_limit,
        ))
        .with_state(state.clone());

    let forecast_routes = Router::new()
        .route("/api/v1/forecast/:city", get(routes::forecast::get_forecast))
        .route_layer(middleware::from_fn_with_state(
            state.policy("forecast", FORECAST_QUOTA),
            enforce_rate_limit,
        ))
        .with_state(state.clone());

    let bulk_routes = Router::new()
        .route("/api/v1/weather/bulk", post(routes::bulk::get_bulk_weather))
        .route_layer(middleware::from_fn_with_state(
            state.policy("bulk_weather", BULK_QUOTA),
            enforce_rate_limit,
        ))
        .with_state(state.clone());

    let index_routes = Router::new()
        .route("/", get(routes::index::index))
        .route_layer(middleware::from_fn_with_state(
            state.policy("index", DEFAULT_QUOTA),
            enforce_rate_limit,
        ));

    // Health is exempt from rate limiting.
    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .with_state(state.clone());

    Router::new()
        .merge(health_routes)
        .merge(index_routes)
        .merge(coordinates_routes)
        .merge(weather_routes)
        .merge(forecast_routes)
        .merge(bulk_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            envelope_fallbacks,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            cache_control,
        ))
        .layer(cors_layer(&state.config))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
