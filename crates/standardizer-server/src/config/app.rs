//! Application configuration for the standardizer server.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `STANDARDIZER_`:
/// - `STANDARDIZER_HOST`: Server bind address (default: "0.0.0.0")
/// - `STANDARDIZER_PORT`: Server port (default: 8001)
/// - `STANDARDIZER_JOBS_DIR`: Root of the per-job directories (default: "./jobs")
/// - `STANDARDIZER_MODEL_COMMAND`: Text-generation executable (default: "ollama")
/// - `STANDARDIZER_MODEL_NAME`: Model identifier passed to `run` (default: "llama3:instruct")
/// - `STANDARDIZER_MODEL_TIMEOUT_SECONDS`: Optional hard limit on a model call
/// - `STANDARDIZER_INSTRUCTIONS_CHAR_BUDGET`: Instruction characters sent to the model (default: 4000)
/// - `STANDARDIZER_MAX_UPLOAD_BYTES`: Request body limit for uploads (default: 50 MiB)
/// - `STANDARDIZER_SERVER_NAME`: Server name for identification
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding one sub-directory per job
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: PathBuf,

    /// Executable of the local text-generation process
    #[serde(default = "default_model_command")]
    pub model_command: String,

    /// Model identifier
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Hard timeout for one model call; unset means wait indefinitely
    #[serde(default)]
    pub model_timeout_seconds: Option<u64>,

    /// Maximum number of instruction characters embedded in the prompt
    #[serde(default = "default_instructions_char_budget")]
    pub instructions_char_budget: usize,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Server name for identification
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_jobs_dir() -> PathBuf {
    PathBuf::from("./jobs")
}

fn default_model_command() -> String {
    "ollama".to_string()
}

fn default_model_name() -> String {
    "llama3:instruct".to_string()
}

fn default_instructions_char_budget() -> usize {
    4000
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_server_name() -> String {
    "standardizer-server".to_string()
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `STANDARDIZER_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("STANDARDIZER_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            jobs_dir: default_jobs_dir(),
            model_command: default_model_command(),
            model_name: default_model_name(),
            model_timeout_seconds: None,
            instructions_char_budget: default_instructions_char_budget(),
            max_upload_bytes: default_max_upload_bytes(),
            server_name: default_server_name(),
        }
    }
}
