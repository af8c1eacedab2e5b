//! Job endpoints: upload, finalize, download and the one-shot `/api` variants.

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::services::{FinalizeResponse, JobInputs, UploadResponse, UploadedFile};
use crate::state::AppState;
use crate::store::{DownloadKind, JobId};

/// Response of the one-shot `POST /api/process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub job_id: JobId,
    pub ideal_url: String,
    pub log_url: String,
    pub summary_url: String,
}

impl ProcessResponse {
    fn for_job(job_id: JobId) -> Self {
        let url = |kind: DownloadKind| format!("/api/download/{}/{}", job_id, kind.as_str());
        Self {
            job_id,
            ideal_url: url(DownloadKind::Ideal),
            log_url: url(DownloadKind::Log),
            summary_url: url(DownloadKind::Summary),
        }
    }
}

/// Save the three uploaded inputs under a new job.
///
/// `POST /process` (multipart fields `ideal`, `raw`, `instructions`)
pub async fn process(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let inputs = read_inputs(multipart).await?;
    Ok(Json(state.jobs.upload(inputs).await?))
}

/// Run the pipeline for a job.
///
/// `POST /finalize/{job_id}`
pub async fn finalize(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<FinalizeResponse>> {
    let job = job_id
        .parse::<JobId>()
        .map_err(|_| AppError::NotFound("job not found".to_string()))?;
    Ok(Json(state.jobs.finalize(&job).await?))
}

/// Fetch an artifact as an attachment.
///
/// `GET /download/{job_id}/{kind}` and `GET /api/download/{job_id}/{kind}`
pub async fn download(
    State(state): State<AppState>,
    Path((job_id, kind)): Path<(String, String)>,
) -> AppResult<Response> {
    let not_ready = || AppError::NotFound("file not ready".to_string());
    let job = job_id.parse::<JobId>().map_err(|_| not_ready())?;
    let kind = kind.parse::<DownloadKind>().map_err(|_| not_ready())?;

    let download = state.jobs.download(&job, kind).await?;
    let disposition = format!("attachment; filename=\"{}\"", download.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, download.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}

/// Upload and finalize in one call, answering with download links.
///
/// `POST /api/process`
pub async fn api_process(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<ProcessResponse>> {
    let inputs = read_inputs(multipart).await?;
    let upload = state.jobs.upload(inputs).await?;
    state.jobs.finalize(&upload.job_id).await?;
    Ok(Json(ProcessResponse::for_job(upload.job_id)))
}

async fn read_inputs(mut multipart: Multipart) -> AppResult<JobInputs> {
    let mut ideal = None;
    let mut raw = None;
    let mut instructions = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let file = UploadedFile::new(file_name, bytes.to_vec());

        match name.as_str() {
            "ideal" => ideal = Some(file),
            "raw" => raw = Some(file),
            "instructions" => instructions = Some(file),
            other => debug!(field = other, "Ignoring unexpected multipart field"),
        }
    }

    match (ideal, raw, instructions) {
        (Some(ideal), Some(raw), Some(instructions)) => Ok(JobInputs {
            ideal,
            raw,
            instructions,
        }),
        (ideal, raw, instructions) => {
            let missing: Vec<&str> = [
                ("ideal", ideal.is_none()),
                ("raw", raw.is_none()),
                ("instructions", instructions.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            Err(AppError::BadRequest(format!(
                "missing form fields: {}",
                missing.join(", ")
            )))
        }
    }
}
