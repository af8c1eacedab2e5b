//! Standardizer Server Library
//!
//! HTTP front of the spreadsheet standardizer:
//!
//! - **Upload**: store an ideal (target) workbook, a raw workbook and an
//!   instructions document under a new job
//! - **Finalize**: ask a local model for a JSON mapping plan, execute it and
//!   fall back to the deterministic ACS rules when it filled nothing
//! - **Download**: hand back the populated workbook, the step log or the summary
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`error`]: Custom error types with Axum integration
//! - [`handlers`]: HTTP route handlers
//! - [`instructions`]: Instruction document text extraction
//! - [`planner`]: Prompt construction and model invocation
//! - [`services`]: The job pipeline
//! - [`store`]: Per-job artifact storage
//! - [`state`]: Shared application state

pub mod config;
pub mod error;
pub mod handlers;
pub mod instructions;
pub mod planner;
pub mod result_ext;
pub mod services;
pub mod state;
pub mod store;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;

use state::AppState;

const DEFAULT_LOG_FILTER: &str = "info,standardizer_server=debug,tower_http=debug";

/// Initialize tracing/logging. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - allow all origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::api_health))
        .route("/process", post(handlers::jobs::process))
        .route("/finalize/{job_id}", post(handlers::jobs::finalize))
        .route("/download/{job_id}/{kind}", get(handlers::jobs::download))
        .route("/api/process", post(handlers::jobs::api_process))
        .route("/api/download/{job_id}/{kind}", get(handlers::jobs::download))
        .layer(body_limit)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
