//! Input validation for city names and coordinate pairs.

use crate::errors::AppError;

/// Maximum length (in characters) kept from a city name.
pub const MAX_CITY_LENGTH: usize = 100;

/// Punctuation allowed in a city name besides alphanumerics.
const CITY_PUNCTUATION: &[char] = &[' ', '-', ',', '.', '\'', '(', ')'];

/// Trim, truncate to [`MAX_CITY_LENGTH`] characters and check the character set.
///
/// Truncation happens before the character check, so a disallowed character
/// past the cap is never seen.
pub fn validate_city(raw: &str) -> Result<String, AppError> {
    let city: String = raw.trim().chars().take(MAX_CITY_LENGTH).collect();

    if city.is_empty() {
        return Err(AppError::InvalidInput("City name is required".to_string()));
    }

    if !city
        .chars()
        .all(|c| c.is_alphanumeric() || CITY_PUNCTUATION.contains(&c))
    {
        return Err(AppError::InvalidInput(
            "Invalid characters in city name".to_string(),
        ));
    }

    Ok(city)
}

/// Validate a city taken from an untyped JSON value (bulk payload entries).
pub fn validate_city_value(raw: &serde_json::Value) -> Result<String, AppError> {
    match raw.as_str() {
        Some(s) => validate_city(s),
        None => Err(AppError::InvalidInput("City name is required".to_string())),
    }
}

/// Parse and range-check a latitude/longitude pair.
///
/// NaN never satisfies the range checks and is rejected with them.
pub fn validate_coordinates(lat_raw: &str, lon_raw: &str) -> Result<(f64, f64), AppError> {
    let lat = parse_coordinate(lat_raw)?;
    let lon = parse_coordinate(lon_raw)?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(invalid_coordinates("Latitude must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(invalid_coordinates("Longitude must be between -180 and 180"));
    }

    Ok((lat, lon))
}

fn parse_coordinate(raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| invalid_coordinates(&format!("could not convert '{}' to a number", raw)))
}

fn invalid_coordinates(reason: &str) -> AppError {
    AppError::InvalidInput(format!("Invalid coordinates: {}", reason))
}
