pub mod bulk;
pub mod forecast;
pub mod health;
pub mod index;
pub mod weather;
