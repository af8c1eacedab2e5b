//! Job service: upload, finalize and download.
//!
//! Finalize re-runs the whole pipeline from the persisted inputs on every
//! call: instructions are extracted, the model is asked for a plan, the plan
//! is executed, and the ACS fallback rules run when the plan filled nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use standardizer_core::{
    apply_fallback, execute_plan, improved, read_workbook, write_workbook, CoreResult, Plan, Table,
};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::instructions::extract_instructions;
use crate::planner::{build_plan_prompt, request_plan, PlanModel};
use crate::result_ext::ResultExt;
use crate::store::{Artifact, DownloadKind, JobId, JobStore};

const FINALIZE_MESSAGE: &str = "AI plan executed (w/ fallback if needed)";
const SUMMARY_NOTES: &str =
    "AI JSON plan executed deterministically; ACS fallback used if plan had no effect.";

/// One uploaded file.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: Option<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name,
            bytes: bytes.into(),
        }
    }
}

/// The three inputs of a job.
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub ideal: UploadedFile,
    pub raw: UploadedFile,
    pub instructions: UploadedFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPaths {
    pub job_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedFiles {
    pub ideal: Option<String>,
    pub raw: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub job_id: JobId,
    pub status: String,
    pub paths: JobPaths,
    pub received: ReceivedFiles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub job_id: JobId,
    pub status: String,
    pub message: String,
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub rows_in_raw: usize,
    pub rows_in_ideal: usize,
    pub plan_chars: usize,
    pub plan_operations: usize,
    pub plan_notes: Vec<String>,
    pub fallback_applied: bool,
    pub notes: String,
}

/// Contents of `transform_log.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformLog {
    pub steps: Vec<String>,
}

/// A downloadable artifact.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: &'static str,
}

/// Service for job operations.
#[derive(Clone)]
pub struct JobService {
    store: JobStore,
    model: Arc<dyn PlanModel>,
    config: Arc<AppConfig>,
}

impl JobService {
    pub fn new(store: JobStore, model: Arc<dyn PlanModel>, config: Arc<AppConfig>) -> Self {
        Self {
            store,
            model,
            config,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Persist the three inputs under a new job.
    pub async fn upload(&self, inputs: JobInputs) -> AppResult<UploadResponse> {
        let job = self.store.create_job().await.log("creating job directory")?;

        self.store.put(&job, Artifact::IdealUpload, &inputs.ideal.bytes).await?;
        self.store.put(&job, Artifact::RawUpload, &inputs.raw.bytes).await?;
        let stored = self
            .store
            .put_instructions(&job, inputs.instructions.file_name.as_deref(), &inputs.instructions.bytes)
            .await?;

        let dir = self.store.job_dir(&job);
        let job_dir = tokio::fs::canonicalize(&dir).await.unwrap_or(dir);

        info!(
            job_id = %job,
            ideal_bytes = inputs.ideal.bytes.len(),
            raw_bytes = inputs.raw.bytes.len(),
            instructions = %stored,
            "Saved job inputs"
        );

        Ok(UploadResponse {
            job_id: job,
            status: "saved_inputs".to_string(),
            paths: JobPaths {
                job_dir: job_dir.display().to_string(),
            },
            received: ReceivedFiles {
                ideal: inputs.ideal.file_name,
                raw: inputs.raw.file_name,
                instructions: inputs.instructions.file_name,
            },
        })
    }

    /// Run the pipeline for `job` and persist every output artifact.
    pub async fn finalize(&self, job: &JobId) -> AppResult<FinalizeResponse> {
        if !self.store.exists(job).await {
            return Err(AppError::NotFound("job not found".to_string()));
        }

        let raw_bytes = self.store.get(job, Artifact::RawUpload).await?;
        let ideal_bytes = self.store.get(job, Artifact::IdealUpload).await?;
        let (Some(raw_bytes), Some(ideal_bytes)) = (raw_bytes, ideal_bytes) else {
            return Err(AppError::BadRequest("missing input files".to_string()));
        };

        // 1. tables; unreadable inputs fail before anything is written
        let (raw, ideal) = tokio::task::spawn_blocking(move || -> CoreResult<(Table, Table)> {
            Ok((read_workbook(&raw_bytes)?, read_workbook(&ideal_bytes)?))
        })
        .await??;
        let ideal = ideal.expanded_to(&raw);
        debug!(
            job_id = %job,
            raw_rows = raw.row_count(),
            raw_columns = raw.column_count(),
            ideal_rows = ideal.row_count(),
            ideal_columns = ideal.column_count(),
            "Loaded tables"
        );

        // 2. instructions
        let instructions = match self.store.get_instructions(job).await? {
            Some((name, bytes)) => {
                tokio::task::spawn_blocking(move || extract_instructions(&name, &bytes)).await?
            }
            None => String::new(),
        };
        self.store.put(job, Artifact::InstructionsText, &instructions).await?;

        // 3. plan request
        let prompt = build_plan_prompt(
            raw.column_names(),
            ideal.column_names(),
            &instructions,
            self.config.instructions_char_budget,
        );
        let response = request_plan(self.model.as_ref(), &prompt).await;
        self.store.put(job, Artifact::PlanRaw, &response.raw_output).await?;
        let plan_json = if response.plan_json.is_empty() {
            "{}"
        } else {
            response.plan_json.as_str()
        };
        self.store.put(job, Artifact::PlanJson, plan_json).await?;

        // 4. plan execution
        let mut steps = response.steps;
        let mut output = ideal.clone();
        let mut plan = Plan::default();
        if response.plan_json.is_empty() {
            steps.push("No JSON plan extracted".to_string());
        } else {
            match Plan::from_json(&response.plan_json) {
                Ok(parsed) => {
                    let execution = execute_plan(&parsed, &raw, &ideal);
                    steps.extend(execution.steps);
                    output = execution.table;
                    plan = parsed;
                }
                Err(e) => {
                    warn!(job_id = %job, error = %e, "Plan could not be parsed");
                    steps.push(format!("[PLAN_PARSE_ERROR] {}", e.detail()));
                }
            }
        }

        // 5. judge and fallback
        let fallback_applied = !improved(&ideal, &output);
        if fallback_applied {
            let fallback = apply_fallback(&raw, &ideal);
            steps.push("FALLBACK: Applied deterministic ACS rules".to_string());
            steps.extend(fallback.steps);
            output = fallback.table;
        }
        info!(
            job_id = %job,
            plan_operations = plan.len(),
            fallback_applied,
            steps = steps.len(),
            "Plan executed"
        );

        // 6. outputs
        let summary = JobSummary {
            rows_in_raw: raw.row_count(),
            rows_in_ideal: output.row_count(),
            plan_chars: response.plan_json.chars().count(),
            plan_operations: plan.len(),
            plan_notes: plan.notes,
            fallback_applied,
            notes: SUMMARY_NOTES.to_string(),
        };

        // The step log and summary are written even when the workbook cannot be encoded.
        let workbook = tokio::task::spawn_blocking(move || write_workbook(&output)).await?;
        if let Err(e) = &workbook {
            steps.push(format!("[OUTPUT_WRITE_ERROR] {}", e.detail()));
        }

        let log = serde_yaml::to_string(&TransformLog { steps })?;
        self.store.put(job, Artifact::TransformLog, log).await?;
        self.store
            .put(job, Artifact::Summary, serde_json::to_vec_pretty(&summary)?)
            .await?;

        let workbook = workbook.log("encoding populated workbook")?;
        self.store
            .put(job, Artifact::IdealFilled, workbook)
            .await
            .log("writing populated workbook")?;

        Ok(FinalizeResponse {
            job_id: *job,
            status: "finalized".to_string(),
            message: FINALIZE_MESSAGE.to_string(),
        })
    }

    /// Fetch a finished artifact.
    pub async fn download(&self, job: &JobId, kind: DownloadKind) -> AppResult<Download> {
        let artifact = kind.artifact();
        let bytes = self
            .store
            .get(job, artifact)
            .await?
            .ok_or_else(|| AppError::NotFound("file not ready".to_string()))?;
        Ok(Download {
            bytes,
            content_type: kind.content_type(),
            file_name: artifact.file_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ModelError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use standardizer_core::CellValue;

    /// Returns the same response to every prompt.
    struct StubModel(Result<String, String>);

    impl StubModel {
        fn replying(text: &str) -> Arc<dyn PlanModel> {
            Arc::new(Self(Ok(text.to_string())))
        }

        fn failing(reason: &str) -> Arc<dyn PlanModel> {
            Arc::new(Self(Err(reason.to_string())))
        }
    }

    #[async_trait]
    impl PlanModel for StubModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            self.0.clone().map_err(ModelError::Failed)
        }
    }

    fn raw_table() -> Table {
        let date = |y, m, d| CellValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap());
        Table::from_rows(
            [
                "Manuscript DOI",
                "Corresponding Author First Name",
                "Corresponding Author Last Name",
                "ASAP Pub Date",
                "Retail Price",
            ],
            vec![
                vec![
                    "10.1021/a".into(),
                    "Jane".into(),
                    "Doe".into(),
                    date(2023, 7, 15),
                    CellValue::Number(3000.456),
                ],
                vec![
                    "10.1021/b".into(),
                    "John".into(),
                    CellValue::Null,
                    date(2023, 6, 15),
                    "2500".into(),
                ],
                vec![
                    "10.1021/c".into(),
                    "Ann".into(),
                    "Lee".into(),
                    CellValue::Null,
                    "n/a".into(),
                ],
            ],
        )
    }

    fn ideal_table() -> Table {
        Table::new([
            "Agreement",
            "Article DOI",
            "Author Name",
            "Publication Date",
            "Calendar Year",
            "Fiscal Year",
            "APC",
        ])
    }

    async fn setup(model: Arc<dyn PlanModel>) -> (tempfile::TempDir, JobService, JobId) {
        setup_with(model, write_workbook(&raw_table()).unwrap()).await
    }

    async fn setup_with(
        model: Arc<dyn PlanModel>,
        raw: Vec<u8>,
    ) -> (tempfile::TempDir, JobService, JobId) {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            jobs_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let service = JobService::new(JobStore::new(dir.path()), model, Arc::new(config));
        let inputs = JobInputs {
            ideal: UploadedFile::new(Some("ideal.xlsx".into()), write_workbook(&ideal_table()).unwrap()),
            raw: UploadedFile::new(Some("raw.xlsx".into()), raw),
            instructions: UploadedFile::new(Some("rules.txt".into()), "Set Agreement to ACS."),
        };
        let response = service.upload(inputs).await.unwrap();
        (dir, service, response.job_id)
    }

    async fn log_steps(service: &JobService, job: &JobId) -> Vec<String> {
        let bytes = service.download(job, DownloadKind::Log).await.unwrap().bytes;
        serde_yaml::from_slice::<TransformLog>(&bytes).unwrap().steps
    }

    async fn summary(service: &JobService, job: &JobId) -> JobSummary {
        let bytes = service.download(job, DownloadKind::Summary).await.unwrap().bytes;
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn output_table(service: &JobService, job: &JobId) -> Table {
        let bytes = service.download(job, DownloadKind::Ideal).await.unwrap().bytes;
        read_workbook(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_persists_inputs() {
        let (_dir, service, job) = setup(StubModel::replying("")).await;
        let store = service.store();
        assert!(store.has(&job, Artifact::IdealUpload).await);
        assert!(store.has(&job, Artifact::RawUpload).await);
        let (name, bytes) = store.get_instructions(&job).await.unwrap().unwrap();
        assert_eq!(name, "instructions_upload.txt");
        assert_eq!(bytes, b"Set Agreement to ACS.");
    }

    #[tokio::test]
    async fn test_no_plan_falls_back() {
        let (_dir, service, job) = setup(StubModel::replying("I am not sure.")).await;
        let response = service.finalize(&job).await.unwrap();
        assert_eq!(response.status, "finalized");

        let steps = log_steps(&service, &job).await;
        assert_eq!(steps[0], "No JSON plan extracted");
        assert_eq!(steps[1], "FALLBACK: Applied deterministic ACS rules");
        assert_eq!(steps[2], "Set Agreement = \"ACS\"");

        let table = output_table(&service, &job).await;
        assert_eq!(table.row_count(), raw_table().row_count());
        assert_eq!(table.column_names(), ideal_table().column_names());
        let author = table.column("Author Name").unwrap();
        assert_eq!(table.get(0, author), &CellValue::from("Jane Doe"));
        assert_eq!(table.get(1, author), &CellValue::from("John"));

        let summary = summary(&service, &job).await;
        assert!(summary.fallback_applied);
        assert_eq!(summary.rows_in_raw, 3);
        assert_eq!(summary.rows_in_ideal, 3);
        assert_eq!(summary.plan_chars, 0);

        let plan_json = service.store().get(&job, Artifact::PlanJson).await.unwrap().unwrap();
        assert_eq!(plan_json, b"{}");
        let plan_raw = service.store().get(&job, Artifact::PlanRaw).await.unwrap().unwrap();
        assert_eq!(plan_raw, b"I am not sure.");
    }

    #[tokio::test]
    async fn test_effective_plan_skips_fallback() {
        let reply = r#"```json
{"mappings": [
  {"op": "copy", "source": "Manuscript DOI", "target": "Article DOI"},
  {"op": "fiscal_year_july_june", "source": "ASAP Pub Date", "target": "Fiscal Year"},
  {"op": "teleport", "source": "x", "target": "y"}
], "notes": ["no agreement column mentioned"]}
```"#;
        let (_dir, service, job) = setup(StubModel::replying(reply)).await;
        service.finalize(&job).await.unwrap();

        let steps = log_steps(&service, &job).await;
        assert_eq!(
            steps,
            vec![
                "Mapped \"Manuscript DOI\" → \"Article DOI\"".to_string(),
                "Fiscal Year (July–June) from \"ASAP Pub Date\" → \"Fiscal Year\"".to_string(),
                "Unknown op 'teleport' skipped".to_string(),
            ]
        );

        let table = output_table(&service, &job).await;
        let fy = table.column("Fiscal Year").unwrap();
        assert_eq!(table.get(0, fy).to_number(), Some(2024.0));
        assert_eq!(table.get(1, fy).to_number(), Some(2023.0));
        assert!(table.get(2, fy).is_null());
        let agreement = table.column("Agreement").unwrap();
        assert!(table.get(0, agreement).is_null());

        let summary = summary(&service, &job).await;
        assert!(!summary.fallback_applied);
        assert_eq!(summary.plan_operations, 3);
        assert_eq!(summary.plan_notes, vec!["no agreement column mentioned".to_string()]);
    }

    #[tokio::test]
    async fn test_unparseable_plan_is_logged() {
        let (_dir, service, job) = setup(StubModel::replying("{\"mappings\": [}")).await;
        service.finalize(&job).await.unwrap();

        let steps = log_steps(&service, &job).await;
        assert!(steps[0].starts_with("[PLAN_PARSE_ERROR] "), "{}", steps[0]);
        assert_eq!(steps[1], "FALLBACK: Applied deterministic ACS rules");
    }

    #[tokio::test]
    async fn test_model_failure_is_logged() {
        let (_dir, service, job) = setup(StubModel::failing("model not found")).await;
        service.finalize(&job).await.unwrap();

        let steps = log_steps(&service, &job).await;
        assert_eq!(steps[0], "[AI_CALL_ERROR] Model process error: model not found");
        assert_eq!(steps[1], "No JSON plan extracted");
        assert_eq!(steps[2], "FALLBACK: Applied deterministic ACS rules");
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let reply = r#"{"mappings": [{"op": "concat", "sources": ["Corresponding Author First Name", "Corresponding Author Last Name"], "target": "Author Name"}]}"#;
        let (_dir, service, job) = setup(StubModel::replying(reply)).await;

        service.finalize(&job).await.unwrap();
        let first_steps = log_steps(&service, &job).await;
        let first_table = output_table(&service, &job).await;

        service.finalize(&job).await.unwrap();
        assert_eq!(log_steps(&service, &job).await, first_steps);
        assert_eq!(output_table(&service, &job).await, first_table);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (_dir, service, _job) = setup(StubModel::replying("")).await;
        let err = service.finalize(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_inputs_is_bad_request() {
        let (_dir, service, _job) = setup(StubModel::replying("")).await;
        let job = service.store().create_job().await.unwrap();
        let err = service.finalize(&job).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_download_before_finalize() {
        let (_dir, service, job) = setup(StubModel::replying("")).await;
        let err = service.download(&job, DownloadKind::Ideal).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == "file not ready"));
    }

    #[tokio::test]
    async fn test_plan_without_effect_falls_back() {
        let reply = r#"{"mappings": [{"op": "copy", "source": "Nope", "target": "Agreement"}]}"#;
        let (_dir, service, job) = setup(StubModel::replying(reply)).await;
        service.finalize(&job).await.unwrap();

        let steps = log_steps(&service, &job).await;
        assert_eq!(
            &steps[..4],
            &[
                "Skipped copy \"Nope\"→\"Agreement\" (missing raw column \"Nope\")".to_string(),
                "FALLBACK: Applied deterministic ACS rules".to_string(),
                "Set Agreement = \"ACS\"".to_string(),
                "Manuscript DOI → Article DOI".to_string(),
            ]
        );

        let summary = summary(&service, &job).await;
        assert!(summary.fallback_applied);
        assert_eq!(summary.plan_operations, 1);
    }

    #[tokio::test]
    async fn test_oversized_concat_still_writes_outputs() {
        let long = "x".repeat(20_000);
        let raw = Table::from_rows(
            ["A", "B"],
            vec![vec![long.as_str().into(), long.as_str().into()]],
        );
        let reply = r#"{"mappings": [{"op": "concat", "sources": ["A", "B"], "target": "Author Name"}]}"#;
        let (_dir, service, job) =
            setup_with(StubModel::replying(reply), write_workbook(&raw).unwrap()).await;

        service.finalize(&job).await.unwrap();

        let table = output_table(&service, &job).await;
        let author = table.column("Author Name").unwrap();
        assert_eq!(
            table.get(0, author).to_text().chars().count(),
            standardizer_core::workbook::MAX_CELL_CHARS
        );
        assert!(!summary(&service, &job).await.fallback_applied);
        assert_eq!(log_steps(&service, &job).await.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_raw_writes_nothing() {
        let (_dir, service, job) =
            setup_with(StubModel::replying(""), b"not a workbook".to_vec()).await;

        let err = service.finalize(&job).await.unwrap_err();
        assert!(matches!(err, AppError::Core(standardizer_core::CoreError::WorkbookRead(_))));
        for artifact in [
            Artifact::InstructionsText,
            Artifact::PlanRaw,
            Artifact::IdealFilled,
            Artifact::TransformLog,
            Artifact::Summary,
        ] {
            assert!(!service.store().has(&job, artifact).await, "{:?}", artifact);
        }
    }
}
