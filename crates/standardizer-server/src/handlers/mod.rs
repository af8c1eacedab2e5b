//! HTTP handlers for the standardizer API.

pub mod health;
pub mod jobs;

pub use health::{api_health, health_check};
