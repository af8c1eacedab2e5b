//! Configuration module for the standardizer server.
//!
//! This module provides configuration loading from environment variables
//! using the `envy` crate for type-safe environment variable parsing.

mod app;

pub use app::AppConfig;
