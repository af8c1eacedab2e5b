//! Result extension traits for logging failures with context.

use std::fmt::Display;
use tracing::error;

/// Adds `log` to `Result`: logs the error with a context message and the
/// caller's source location, then hands the result back unchanged.
pub trait ResultExt<T, E> {
    /// Log the error with context if this is an `Err` variant.
    ///
    /// ```ignore
    /// use standardizer_server::result_ext::ResultExt;
    ///
    /// store.put(&job, Artifact::Summary, bytes).await.log("persisting summary")?;
    /// ```
    fn log<S: ToString>(self, context: S) -> Result<T, E>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller_location = std::panic::Location::caller();
            error!(
                target: "standardizer_server",
                error = %e,
                file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                context = %context.to_string(),
                "Operation failed"
            );
        }
        self
    }
}
