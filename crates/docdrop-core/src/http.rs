// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - HTTP transmitter
//
// Streams one file per request as a multipart `file` part. Progress is
// computed from the bytes handed to the request body, so it tracks what
// has been sent, not what the server has stored.

use crate::transmit::{
    percent_of, FileSource, ProgressReporter, TransmitError, Transmitter, UploadFile,
    UploadedDocRef,
};
use crate::types::{AppError, UploadSettings};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

/// Body of the upload endpoint's reply
#[derive(Debug, Default, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    results: Vec<UploadResult>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResult {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for uploading documents to the server
pub struct HttpTransmitter {
    http_client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpTransmitter {
    pub fn new(settings: &UploadSettings) -> Result<Self, AppError> {
        let mut builder = Client::builder()
            // Stalled connections are caught by read_timeout; large files get no overall limit
            .read_timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30));
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let http_client = builder
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: settings.upload_url(),
            auth_token: settings.auth_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
    ) -> Result<UploadedDocRef, TransmitError> {
        let reader: Box<dyn AsyncRead + Send + Sync + Unpin> = match &file.source {
            FileSource::Path(path) => Box::new(File::open(path).await.map_err(|e| {
                TransmitError::Transport(format!("Failed to open file: {}", e))
            })?),
            FileSource::Bytes(bytes) => Box::new(Cursor::new(bytes.clone())),
        };

        let total = file.size_bytes;
        let sent = Arc::new(AtomicU64::new(0));
        let last_percent = Arc::new(AtomicU8::new(0));
        let stream = ReaderStream::new(reader).inspect({
            let progress = progress.clone();
            move |chunk| {
                if let Ok(chunk) = chunk {
                    let now = sent.fetch_add(chunk.len() as u64, Ordering::SeqCst)
                        + chunk.len() as u64;
                    let percent = percent_of(now, total);
                    // Only report whole-percent changes to avoid flooding the queue
                    if percent > last_percent.swap(percent, Ordering::SeqCst) {
                        progress.report(percent);
                    }
                }
            }
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| TransmitError::Transport(format!("Invalid media type: {}", e)))?;
        let form = Form::new().part("file", part);

        let mut request = self.http_client.post(&self.endpoint).multipart(form);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                TransmitError::Transport(format!("Cannot connect to {} - {}", self.endpoint, e))
            } else if e.is_timeout() {
                TransmitError::Transport(format!("Upload of {} timed out", file.name))
            } else {
                TransmitError::Transport(format!("Upload failed: {}", e))
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(TransmitError::Transport(format!(
                "Server returned {}: {}",
                status.as_u16(),
                message
            )));
        }

        doc_ref_from_body(&body)
    }
}

impl Transmitter for HttpTransmitter {
    fn transmit(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<UploadedDocRef, TransmitError>> + Send {
        async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(TransmitError::Cancelled),
                result = self.send(file, progress) => result,
            }
        }
    }
}

/// Extract the document reference from a successful reply
fn doc_ref_from_body(body: &str) -> Result<UploadedDocRef, TransmitError> {
    let response: UploadResponse = serde_json::from_str(body)
        .map_err(|e| TransmitError::Transport(format!("Failed to parse response: {}", e)))?;

    let result = response.results.into_iter().next().ok_or_else(|| {
        TransmitError::Transport(
            response
                .error
                .or(response.message)
                .unwrap_or_else(|| "Server returned no upload result".to_string()),
        )
    })?;

    if let Some(error) = result.error {
        return Err(TransmitError::Transport(format!("Server rejected upload: {}", error)));
    }

    match result.id {
        Some(Value::String(id)) if !id.is_empty() => Ok(UploadedDocRef(id)),
        Some(Value::Number(id)) => Ok(UploadedDocRef(id.to_string())),
        _ => Err(TransmitError::Transport(
            "Server returned no document id".to_string(),
        )),
    }
}

/// Pull a human-readable message out of an error body
fn error_message(body: &str) -> Option<String> {
    if let Ok(response) = serde_json::from_str::<UploadResponse>(body) {
        if let Some(message) = response.message.or(response.error) {
            return Some(message);
        }
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
