//! Service layer for the standardizer server.
//!
//! Services hold the job pipeline and sit between the HTTP handlers and the
//! job store.

pub mod job;

pub use job::{
    Download, FinalizeResponse, JobInputs, JobService, JobSummary, TransformLog, UploadResponse,
    UploadedFile,
};
