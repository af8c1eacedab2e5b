//! Per-job artifact storage.
//!
//! Each job owns one directory under the configured root; artifacts inside it
//! live under fixed file names. The store is the only component that touches
//! the filesystem layout.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File name prefix of the uploaded instructions document.
const INSTRUCTIONS_UPLOAD: &str = "instructions_upload";

/// Opaque job identifier (a UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    /// Only well-formed UUIDs are job ids, so an id can never escape the jobs root.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Fixed-name artifacts of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    IdealUpload,
    RawUpload,
    InstructionsText,
    PlanRaw,
    PlanJson,
    IdealFilled,
    TransformLog,
    Summary,
}

impl Artifact {
    pub fn file_name(&self) -> &'static str {
        match self {
            Artifact::IdealUpload => "ideal_upload.xlsx",
            Artifact::RawUpload => "raw_upload.xlsx",
            Artifact::InstructionsText => "instructions.txt",
            Artifact::PlanRaw => "plan_raw.txt",
            Artifact::PlanJson => "plan.json",
            Artifact::IdealFilled => "ideal_filled.xlsx",
            Artifact::TransformLog => "transform_log.yaml",
            Artifact::Summary => "summary.json",
        }
    }
}

/// Artifacts that can be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    Ideal,
    Log,
    Summary,
}

impl DownloadKind {
    pub fn artifact(&self) -> Artifact {
        match self {
            DownloadKind::Ideal => Artifact::IdealFilled,
            DownloadKind::Log => Artifact::TransformLog,
            DownloadKind::Summary => Artifact::Summary,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DownloadKind::Ideal => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DownloadKind::Log => "text/plain; charset=utf-8",
            DownloadKind::Summary => "application/json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadKind::Ideal => "ideal",
            DownloadKind::Log => "log",
            DownloadKind::Summary => "summary",
        }
    }
}

impl FromStr for DownloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ideal" => Ok(DownloadKind::Ideal),
            "log" => Ok(DownloadKind::Log),
            "summary" => Ok(DownloadKind::Summary),
            other => Err(format!("unknown download kind: {}", other)),
        }
    }
}

/// Directory-per-job artifact store.
#[derive(Debug, Clone)]
pub struct JobStore {
    root: PathBuf,
}

impl JobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed.
    pub async fn init(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn job_dir(&self, job: &JobId) -> PathBuf {
        self.root.join(job.to_string())
    }

    /// Mint a new job id and create its directory.
    pub async fn create_job(&self) -> io::Result<JobId> {
        let job = JobId::new();
        tokio::fs::create_dir_all(self.job_dir(&job)).await?;
        Ok(job)
    }

    pub async fn exists(&self, job: &JobId) -> bool {
        tokio::fs::metadata(self.job_dir(job))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    pub async fn put(&self, job: &JobId, artifact: Artifact, bytes: impl AsRef<[u8]>) -> io::Result<()> {
        tokio::fs::write(self.job_dir(job).join(artifact.file_name()), bytes).await
    }

    /// Read an artifact; `None` when it has not been written.
    pub async fn get(&self, job: &JobId, artifact: Artifact) -> io::Result<Option<Vec<u8>>> {
        read_optional(&self.job_dir(job).join(artifact.file_name())).await
    }

    pub async fn has(&self, job: &JobId, artifact: Artifact) -> bool {
        tokio::fs::metadata(self.job_dir(job).join(artifact.file_name()))
            .await
            .is_ok()
    }

    /// Store the instructions document, keeping the original extension so the
    /// extractor can pick a decoder. Returns the stored file name.
    pub async fn put_instructions(
        &self,
        job: &JobId,
        original_name: Option<&str>,
        bytes: impl AsRef<[u8]>,
    ) -> io::Result<String> {
        let file_name = match original_name.and_then(sanitized_extension) {
            Some(ext) => format!("{}.{}", INSTRUCTIONS_UPLOAD, ext),
            None => INSTRUCTIONS_UPLOAD.to_string(),
        };
        tokio::fs::write(self.job_dir(job).join(&file_name), bytes).await?;
        Ok(file_name)
    }

    /// The stored instructions document as `(file name, bytes)`.
    pub async fn get_instructions(&self, job: &JobId) -> io::Result<Option<(String, Vec<u8>)>> {
        let mut entries = match tokio::fs::read_dir(self.job_dir(job)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(INSTRUCTIONS_UPLOAD) {
                let bytes = tokio::fs::read(entry.path()).await?;
                return Ok(Some((name, bytes)));
            }
        }
        Ok(None)
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Lower-cased extension of an uploaded file name with unsafe characters replaced.
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    let cleaned: String = ext
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}
