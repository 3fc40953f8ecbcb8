//! OpenWeatherMap client.
//!
//! Issues a single outbound call per operation and translates transport
//! failures into [`AppError`] kinds. No retries.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;

use crate::config::AppConfig;
use crate::errors::AppError;

/// Unit system requested on every call.
const UNITS: &str = "metric";
/// Timeout for the health-check ping.
const PING_TIMEOUT: Duration = Duration::from_secs(5);
/// Fixed query used by the health-check ping.
const PING_CITY: &str = "London";

pub const MSG_NOT_FOUND: &str = "Location not found";
pub const MSG_TIMEOUT: &str = "Weather service is temporarily unavailable";
pub const MSG_TRANSPORT: &str = "Unable to fetch weather data";

/// Provider operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CurrentWeather,
    Forecast,
}

impl Operation {
    pub fn path(&self) -> &'static str {
        match self {
            Operation::CurrentWeather => "weather",
            Operation::Forecast => "forecast",
        }
    }
}

/// Client for the weather provider.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        let user_agent = format!("WeatherFacade/{}", env!("CARGO_PKG_VERSION"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|e| AppError::Internal(format!("Invalid User-Agent: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.weather_api_base_url.clone(),
            api_key: config.weather_api_key.clone(),
            timeout: config.weather_api_timeout,
        })
    }

    fn url_for(&self, operation: Operation) -> String {
        format!("{}/{}", self.base_url, operation.path())
    }

    /// Call the provider and return its raw JSON document.
    ///
    /// Credentials and `units=metric` are appended to `params`.
    /// HTTP 404 maps to `NotFound`; timeouts, other non-2xx statuses and
    /// undecodable bodies map to `Unavailable`.
    pub async fn fetch(
        &self,
        operation: Operation,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, AppError> {
        let url = self.url_for(operation);

        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        query.push(("appid", self.api_key.as_str()));
        query.push(("units", UNITS));

        let response = self
            .client
            .get(&url)
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&url, params, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(MSG_NOT_FOUND.to_string()));
        }

        let response = response
            .error_for_status()
            .map_err(|e| transport_error(&url, params, e))?;

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| transport_error(&url, params, e))
    }

    /// Probe the provider with a fixed query. Returns the HTTP status, or
    /// `None` when the request itself failed.
    pub async fn ping(&self) -> Option<StatusCode> {
        let url = self.url_for(Operation::CurrentWeather);
        match self
            .client
            .get(&url)
            .query(&[("q", PING_CITY), ("appid", self.api_key.as_str())])
            .timeout(PING_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => Some(resp.status()),
            Err(e) => {
                tracing::warn!(url = %url, "Weather API health ping failed: {}", e.without_url());
                None
            }
        }
    }
}

/// Log the failed call and map it. reqwest embeds the full request URL
/// (including `appid`) in its error display, so it is stripped first.
fn transport_error(url: &str, params: &[(&str, String)], err: reqwest::Error) -> AppError {
    let shown: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    let timed_out = err.is_timeout();
    let cause = err.without_url();

    if timed_out {
        tracing::error!(url, params = %shown.join("&"), "Weather API timeout: {}", cause);
        AppError::Unavailable(MSG_TIMEOUT.to_string())
    } else {
        tracing::error!(url, params = %shown.join("&"), "Weather API error: {}", cause);
        AppError::Unavailable(MSG_TRANSPORT.to_string())
    }
}
