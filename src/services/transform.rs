//! Provider → output schema mapping.
//!
//! Pure functions: the provider's raw JSON is deserialized into private
//! typed structs and reshaped into [`WeatherReport`] / [`ForecastReport`].
//!
//! Epoch timestamps (`dt`, `sunrise`, `sunset`) are rendered as naive
//! server-local time, not shifted by the location's `timezone` offset.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Maximum number of days in a forecast report.
pub const MAX_FORECAST_DAYS: usize = 5;
/// Visibility assumed when the provider omits it (metres).
const DEFAULT_VISIBILITY_M: f64 = 10_000.0;

// ---------------------------------------------------------------------------
// Output schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Temperatures in °C, rounded to whole degrees.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Temperature {
    pub current: i64,
    pub feels_like: i64,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Condition {
    /// Condition category (e.g. "Rain")
    pub main: String,
    /// Title-cased description (e.g. "Light Rain")
    pub description: String,
    /// Provider icon code (e.g. "10d")
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeatherDetails {
    /// Relative humidity in percent
    pub humidity: i64,
    /// Pressure in hPa
    pub pressure: i64,
    /// Visibility in whole kilometres
    pub visibility: i64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Wind direction in degrees
    pub wind_direction: i64,
    /// Cloud cover in percent
    pub clouds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SunTimes {
    /// Local HH:MM
    pub sunrise: String,
    /// Local HH:MM
    pub sunset: String,
}

/// Normalized current conditions for a single location.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub coordinates: Coordinates,
    pub temperature: Temperature,
    pub weather: Condition,
    pub details: WeatherDetails,
    pub sun: SunTimes,
    /// Offset from UTC in seconds, as reported by the provider
    pub timezone: i64,
    /// Observation time, ISO 8601 without offset
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyTemperature {
    pub min: i64,
    pub max: i64,
    pub average: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyDetails {
    pub humidity: i64,
    pub wind_speed: f64,
    pub clouds: i64,
    /// Rain volume for the last 3 hours, mm
    pub rain: f64,
    /// Snow volume for the last 3 hours, mm
    pub snow: f64,
}

/// One day of the forecast, taken from the first interval of that date.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyForecast {
    /// YYYY-MM-DD
    pub date: String,
    /// Weekday name (e.g. "Monday")
    pub day: String,
    pub temperature: DailyTemperature,
    pub weather: Condition,
    pub details: DailyDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastReport {
    pub city: String,
    pub country: String,
    pub forecast: Vec<DailyForecast>,
}

// ---------------------------------------------------------------------------
// Provider JSON shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OwCurrent {
    name: String,
    dt: i64,
    coord: OwCoord,
    sys: OwSys,
    main: OwMain,
    weather: Vec<OwCondition>,
    wind: OwWind,
    clouds: OwClouds,
    visibility: Option<f64>,
    timezone: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: String,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecast {
    city: OwCity,
    list: Vec<OwInterval>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwInterval {
    dt: i64,
    main: OwIntervalMain,
    weather: Vec<OwCondition>,
    wind: OwWind,
    clouds: OwClouds,
    rain: Option<OwVolume>,
    snow: Option<OwVolume>,
}

#[derive(Debug, Deserialize)]
struct OwIntervalMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwVolume {
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Round half to even, so 2.5 → 2 and 3.5 → 4.
fn round_temp(v: f64) -> i64 {
    v.round_ties_even() as i64
}

fn whole(v: f64) -> i64 {
    v.round() as i64
}

/// Capitalize the first letter of every word and lowercase the rest.
/// Any non-alphabetic character starts a new word ("o'clock" → "O'Clock").
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Convert a Unix timestamp to server-local time.
fn local_time(ts: i64) -> Result<DateTime<Local>, AppError> {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&Local))
        .ok_or_else(|| AppError::Internal(format!("Timestamp out of range: {}", ts)))
}

fn first_condition(conditions: &[OwCondition]) -> Result<Condition, AppError> {
    let c = conditions.first().ok_or_else(|| {
        AppError::Internal("Provider response contains no weather conditions".to_string())
    })?;
    Ok(Condition {
        main: c.main.clone(),
        description: title_case(&c.description),
        icon: c.icon.clone(),
    })
}

fn structure_error(e: serde_json::Error) -> AppError {
    AppError::Internal(format!("Provider response structure error: {}", e))
}

// ---------------------------------------------------------------------------
// Transformations
// ---------------------------------------------------------------------------

/// Map a current-conditions document into a [`WeatherReport`].
pub fn to_weather_report(raw: &serde_json::Value) -> Result<WeatherReport, AppError> {
    let data = OwCurrent::deserialize(raw).map_err(structure_error)?;

    Ok(WeatherReport {
        city: data.name,
        country: data.sys.country,
        coordinates: Coordinates {
            latitude: data.coord.lat,
            longitude: data.coord.lon,
        },
        temperature: Temperature {
            current: round_temp(data.main.temp),
            feels_like: round_temp(data.main.feels_like),
            min: round_temp(data.main.temp_min),
            max: round_temp(data.main.temp_max),
        },
        weather: first_condition(&data.weather)?,
        details: WeatherDetails {
            humidity: whole(data.main.humidity),
            pressure: whole(data.main.pressure),
            visibility: (data.visibility.unwrap_or(DEFAULT_VISIBILITY_M) / 1000.0).floor() as i64,
            wind_speed: data.wind.speed,
            wind_direction: whole(data.wind.deg.unwrap_or(0.0)),
            clouds: whole(data.clouds.all),
        },
        sun: SunTimes {
            sunrise: local_time(data.sys.sunrise)?.format("%H:%M").to_string(),
            sunset: local_time(data.sys.sunset)?.format("%H:%M").to_string(),
        },
        timezone: data.timezone.unwrap_or(0),
        updated_at: local_time(data.dt)?
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
    })
}

/// Collapse the 3-hour interval series into at most [`MAX_FORECAST_DAYS`]
/// daily entries. The first interval of each calendar date wins; later
/// intervals of the same date are dropped, and scanning stops at the cap.
fn collect_daily(list: &[OwInterval]) -> Result<Vec<DailyForecast>, AppError> {
    let mut days = Vec::with_capacity(MAX_FORECAST_DAYS);
    let mut seen: Vec<NaiveDate> = Vec::with_capacity(MAX_FORECAST_DAYS);

    for item in list {
        if days.len() >= MAX_FORECAST_DAYS {
            break;
        }

        let when = local_time(item.dt)?;
        let date = when.date_naive();
        if seen.contains(&date) {
            continue;
        }

        days.push(DailyForecast {
            date: when.format("%Y-%m-%d").to_string(),
            day: when.format("%A").to_string(),
            temperature: DailyTemperature {
                min: round_temp(item.main.temp_min),
                max: round_temp(item.main.temp_max),
                average: round_temp(item.main.temp),
            },
            weather: first_condition(&item.weather)?,
            details: DailyDetails {
                humidity: whole(item.main.humidity),
                wind_speed: item.wind.speed,
                clouds: whole(item.clouds.all),
                rain: item
                    .rain
                    .as_ref()
                    .and_then(|v| v.three_hours)
                    .unwrap_or(0.0),
                snow: item
                    .snow
                    .as_ref()
                    .and_then(|v| v.three_hours)
                    .unwrap_or(0.0),
            },
        });
        seen.push(date);
    }

    Ok(days)
}

/// Map a forecast document into a [`ForecastReport`].
pub fn to_forecast_report(raw: &serde_json::Value) -> Result<ForecastReport, AppError> {
    let data = OwForecast::deserialize(raw).map_err(structure_error)?;
    Ok(ForecastReport {
        forecast: collect_daily(&data.list)?,
        city: data.city.name,
        country: data.city.country,
    })
}
