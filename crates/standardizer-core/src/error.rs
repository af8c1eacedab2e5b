//! Error types for the standardizer core.

use thiserror::Error;

/// Errors raised by the mapping engine and the workbook codec.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The workbook could not be opened or decoded.
    #[error("Workbook read error: {0}")]
    WorkbookRead(String),

    /// The output workbook could not be produced.
    #[error("Workbook write error: {0}")]
    WorkbookWrite(String),

    /// The plan text is not a usable plan document.
    #[error("Plan parse error: {0}")]
    PlanParse(String),

    /// A single plan operation could not be applied.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl CoreError {
    /// The underlying message without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            CoreError::WorkbookRead(msg)
            | CoreError::WorkbookWrite(msg)
            | CoreError::PlanParse(msg)
            | CoreError::InvalidOperation(msg) => msg,
        }
    }
}

impl From<calamine::Error> for CoreError {
    fn from(err: calamine::Error) -> Self {
        CoreError::WorkbookRead(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for CoreError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        CoreError::WorkbookWrite(err.to_string())
    }
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
