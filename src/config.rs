use std::time::Duration;

/// Default upstream base URL (OpenWeatherMap 2.5 API).
const DEFAULT_WEATHER_API_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
/// Default upstream timeout budget in seconds.
const DEFAULT_WEATHER_API_TIMEOUT_SECS: u64 = 10;
/// Storage location understood by the in-process cache and rate limiter.
pub const MEMORY_STORAGE_URL: &str = "memory://";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("WEATHER_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Deployment mode. `Development` is the debug mode: caching is bypassed
/// and unexpected error messages are surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Testing,
}

impl Environment {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" => Some(Self::Development),
            "testing" | "test" => Some(Self::Testing),
            _ => None,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub weather_api_key: String,
    pub weather_api_base_url: String,
    pub weather_api_timeout: Duration,
    /// Cache store location. Only `memory://` is backed by this service.
    pub cache_url: String,
    pub cache_key_prefix: String,
    /// Rate-limit storage location. Only `memory://` is backed by this service.
    pub ratelimit_storage_url: String,
    /// Allowed cross-origin sources; `["*"]` means any.
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let weather_api_key = lookup("WEATHER_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let environment = match lookup("APP_ENV") {
            Some(raw) => Environment::parse(&raw).ok_or(ConfigError::Invalid {
                key: "APP_ENV",
                value: raw,
            })?,
            None => Environment::Production,
        };

        let timeout_secs = match lookup("WEATHER_API_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    key: "WEATHER_API_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => DEFAULT_WEATHER_API_TIMEOUT_SECS,
        };

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw,
            })?,
            None => 5000,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            environment,
            weather_api_key,
            weather_api_base_url: lookup("WEATHER_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_WEATHER_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            weather_api_timeout: Duration::from_secs(timeout_secs),
            cache_url: lookup("CACHE_URL").unwrap_or_else(|| MEMORY_STORAGE_URL.to_string()),
            cache_key_prefix: lookup("CACHE_KEY_PREFIX")
                .unwrap_or_else(|| "weather_app".to_string()),
            ratelimit_storage_url: lookup("RATELIMIT_STORAGE_URL")
                .unwrap_or_else(|| MEMORY_STORAGE_URL.to_string()),
            cors_origins,
            log_level: lookup("LOG_LEVEL")
                .unwrap_or_else(|| "info".to_string())
                .to_ascii_lowercase(),
            log_format,
            port,
        })
    }

    /// Debug mode: no response caching, unexpected errors surface verbatim.
    pub fn is_debug(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}
