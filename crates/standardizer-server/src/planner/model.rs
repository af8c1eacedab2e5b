//! Text-generation backends for plan requests.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to start model process `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model process error: {0}")]
    Failed(String),

    #[error("Model process timed out after {0} seconds")]
    Timeout(u64),

    #[error("Model process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that turns a prompt into text.
#[async_trait]
pub trait PlanModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;

    /// Identifier used in logs.
    fn name(&self) -> String {
        "model".to_string()
    }
}

/// Local model run through the Ollama CLI: `<command> run <model>`, prompt on stdin.
#[derive(Debug, Clone)]
pub struct OllamaModel {
    command: String,
    model: String,
    timeout: Option<Duration>,
}

impl OllamaModel {
    pub fn new(command: impl Into<String>, model: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            command: command.into(),
            model: model.into(),
            timeout,
        }
    }
}

#[async_trait]
impl PlanModel for OllamaModel {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let mut child = Command::new(&self.command)
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ModelError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Feed stdin and drain both pipes concurrently so a chatty process never blocks.
        let prompt = prompt.to_owned();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        });
        let stdout_reader = tokio::spawn(read_pipe(stdout));
        let stderr_reader = tokio::spawn(read_pipe(stderr));

        let status = match self.timeout {
            Some(duration) => match timeout(duration, child.wait()).await {
                Ok(result) => result?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(ModelError::Timeout(duration.as_secs()));
                }
            },
            None => child.wait().await?,
        };

        // A process that exits without reading its input closes the pipe early.
        if let Ok(Err(e)) = writer.await {
            tracing::debug!(error = %e, "Model process did not consume the whole prompt");
        }
        let stdout = stdout_reader.await.unwrap_or_default();
        let stderr = stderr_reader.await.unwrap_or_default();

        if !status.success() {
            let detail = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr.trim().to_string()
            };
            return Err(ModelError::Failed(detail));
        }
        Ok(stdout)
    }

    fn name(&self) -> String {
        format!("{} run {}", self.command, self.model)
    }
}

async fn read_pipe<R: tokio::io::AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}
