//! Service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for uploaded inputs awaiting transformation
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory for transformed output artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// External transformation program invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Command used to launch the transformer
    #[serde(default = "default_command")]
    pub command: String,

    /// Script passed as the first argument (omit for native tools)
    #[serde(default = "default_script")]
    pub script: Option<PathBuf>,
}

fn default_http_port() -> u16 {
    5000
}
fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024 // 100MB
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_command() -> String {
    "python3".to_string()
}
fn default_script() -> Option<PathBuf> {
    Some(PathBuf::from("obfuscator.py"))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            script: default_script(),
        }
    }
}
