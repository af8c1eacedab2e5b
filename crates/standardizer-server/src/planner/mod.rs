//! Plan requester: prompt construction, model invocation and JSON extraction.

mod model;
mod prompt;

pub use model::{ModelError, OllamaModel, PlanModel};
pub use prompt::{build_plan_prompt, extract_json_block};

use tracing::{info, warn};

/// What came back from one plan request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanResponse {
    /// Unmodified model output; empty when the call failed.
    pub raw_output: String,
    /// Extracted JSON text; empty when none was found.
    pub plan_json: String,
    /// `[AI_CALL_ERROR] ...` when the model could not be reached.
    pub steps: Vec<String>,
}

/// Ask `model` for a plan. Model failures are reported as step lines.
pub async fn request_plan(model: &dyn PlanModel, prompt: &str) -> PlanResponse {
    match model.generate(prompt).await {
        Ok(raw_output) => {
            let plan_json = extract_json_block(&raw_output);
            info!(
                model = %model.name(),
                output_chars = raw_output.chars().count(),
                plan_chars = plan_json.chars().count(),
                "Model returned"
            );
            PlanResponse {
                raw_output,
                plan_json,
                steps: Vec::new(),
            }
        }
        Err(e) => {
            warn!(model = %model.name(), error = %e, "Model call failed");
            PlanResponse {
                steps: vec![format!("[AI_CALL_ERROR] {}", e)],
                ..PlanResponse::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(Result<&'static str, &'static str>);

    #[async_trait]
    impl PlanModel for Fixed {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            self.0
                .map(str::to_string)
                .map_err(|e| ModelError::Failed(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_request_plan_extracts_json() {
        let model = Fixed(Ok("Sure!\n```json\n{\"mappings\": []}\n```"));
        let response = request_plan(&model, "prompt").await;
        assert_eq!(response.plan_json, "{\"mappings\": []}");
        assert!(response.raw_output.starts_with("Sure!"));
        assert!(response.steps.is_empty());
    }

    #[tokio::test]
    async fn test_request_plan_reports_call_error() {
        let model = Fixed(Err("connection refused"));
        let response = request_plan(&model, "prompt").await;
        assert_eq!(response.raw_output, "");
        assert_eq!(response.plan_json, "");
        assert_eq!(
            response.steps,
            vec!["[AI_CALL_ERROR] Model process error: connection refused".to_string()]
        );
    }
}
