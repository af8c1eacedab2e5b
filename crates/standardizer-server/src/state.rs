//! Application state for the standardizer server.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::services::JobService;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Job pipeline
    pub jobs: JobService,

    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,

    /// Wall-clock start time reported by the health endpoint
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(jobs: JobService, config: Arc<AppConfig>) -> Self {
        Self {
            jobs,
            config,
            start_time: std::time::Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
