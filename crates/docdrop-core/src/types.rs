// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Type definitions

use serde::{Deserialize, Serialize};

/// Media types accepted when no allow-list is configured
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Upload settings shared by the queue, the HTTP transport and frontends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    /// Maximum number of simultaneous uploads
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Largest file accepted for upload, in bytes
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Media types accepted for upload
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// Base URL of the document server
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Path of the upload endpoint on the server
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    /// Bearer token presented with every upload
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Optional per-request timeout. None means no overall timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Automatic retry attempts the CLI makes for failed uploads
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between automatic retries in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_concurrency() -> usize {
    3
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect()
}

fn default_server_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_upload_path() -> String {
    "/api/upload".to_string()
}

fn default_max_retries() -> u32 {
    0
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_file_bytes: default_max_file_bytes(),
            allowed_types: default_allowed_types(),
            server_url: default_server_url(),
            upload_path: default_upload_path(),
            auth_token: None,
            request_timeout_secs: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl UploadSettings {
    /// Reject settings the queue cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.concurrency == 0 {
            return Err(AppError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.allowed_types.is_empty() {
            return Err(AppError::InvalidConfig(
                "allowed types must not be empty".to_string(),
            ));
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(AppError::InvalidConfig(format!(
                "server URL must be http(s): {}",
                self.server_url
            )));
        }
        Ok(())
    }

    /// Full URL of the upload endpoint
    pub fn upload_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        if self.upload_path.starts_with('/') {
            format!("{}{}", base, self.upload_path)
        } else {
            format!("{}/{}", base, self.upload_path)
        }
    }
}

/// Error types for the application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No async runtime available: {0}")]
    Runtime(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileIo(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
