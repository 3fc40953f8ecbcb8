pub mod cache;
pub mod openweather;
pub mod pipeline;
pub mod rate_limit;
pub mod transform;
pub mod validation;
