// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Transmission contract
//
// The queue never talks to the network itself. It hands each dispatched
// file to a Transmitter together with a progress reporter and a cancel
// token, and records whatever the transmitter resolves to.

use crate::types::AppError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where the bytes of an upload come from
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Streamed from disk when the upload starts
    Path(PathBuf),
    /// Already in memory
    Bytes(Bytes),
}

/// A file selected for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub source: FileSource,
}

impl UploadFile {
    /// Describe an in-memory file
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size_bytes: data.len() as u64,
            mime_type: mime_type.into(),
            source: FileSource::Bytes(data),
        }
    }

    /// Describe a file on disk, guessing its media type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| AppError::FileIo(format!("Failed to get file info: {}", e)))?;

        if !metadata.is_file() {
            return Err(AppError::FileIo(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .ok_or_else(|| AppError::FileIo("Invalid file path".to_string()))?
            .to_string_lossy()
            .to_string();

        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(Self {
            name,
            size_bytes: metadata.len(),
            mime_type,
            source: FileSource::Path(path.to_path_buf()),
        })
    }
}

/// Opaque reference to an uploaded document, as returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadedDocRef(pub String);

impl fmt::Display for UploadedDocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a transmission did not produce a document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransmitError {
    #[error("{0}")]
    Transport(String),

    #[error("Upload cancelled")]
    Cancelled,
}

/// Callback handed to a transmitter for percentage updates
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(u8) + Send + Sync>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Reporter that drops every update
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report a percentage; values above 100 are clamped
    pub fn report(&self, percent: u8) {
        (self.sink)(percent.min(100));
    }

    /// Report progress as bytes sent out of a total
    pub fn report_bytes(&self, sent: u64, total: u64) {
        self.report(percent_of(sent, total));
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

/// Integer percentage of `sent` over `total`, capped at 100
pub fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (sent.min(total) as u128 * 100) / total as u128;
    pct as u8
}

/// Performs the network transfer for one file.
///
/// Implementations must resolve with `TransmitError::Cancelled` (or any
/// outcome; it is ignored) once `cancel` fires, and should stop sending
/// as soon as practical.
pub trait Transmitter: Send + Sync + 'static {
    fn transmit(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<UploadedDocRef, TransmitError>> + Send;
}
