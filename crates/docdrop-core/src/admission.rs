// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Admission filter
//
// Every added file becomes a task. Files that fail the type or size
// checks are recorded as failed and never reach the dispatch queue.

use crate::dispatch::DispatchQueue;
use crate::registry::TaskRegistry;
use crate::task::{TaskId, TaskRecord};
use crate::transmit::UploadFile;
use crate::types::UploadSettings;

/// Why a file was refused at admission
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid file type: {0}")]
    UnsupportedType(String),

    #[error("File exceeds {} limit", display_size(.limit))]
    TooLarge { size: u64, limit: u64 },
}

/// Outcome of admitting one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Admission {
    pub id: TaskId,
    pub rejected: Option<ValidationError>,
}

/// Media type allow-list plus size ceiling
#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    allowed_types: Vec<String>,
    max_bytes: u64,
}

impl AdmissionFilter {
    pub fn new(allowed_types: Vec<String>, max_bytes: u64) -> Self {
        let allowed_types = allowed_types
            .into_iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .collect();
        Self {
            allowed_types,
            max_bytes,
        }
    }

    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::new(settings.allowed_types.clone(), settings.max_file_bytes)
    }

    /// Check a file against the type allow-list, then the size limit
    pub fn check(&self, file: &UploadFile) -> Result<(), ValidationError> {
        let mime = essence(&file.mime_type);
        if !self.allowed_types.iter().any(|allowed| *allowed == mime) {
            return Err(ValidationError::UnsupportedType(file.mime_type.clone()));
        }
        if file.size_bytes > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: file.size_bytes,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Create the task record for `file` and queue it if it passes the checks
    pub(crate) fn admit(
        &self,
        file: UploadFile,
        registry: &mut TaskRegistry,
        queue: &mut DispatchQueue,
    ) -> Admission {
        let id = TaskId::new();
        match self.check(&file) {
            Ok(()) => {
                registry.insert(TaskRecord::pending(id, file));
                queue.enqueue_if_absent(id);
                Admission { id, rejected: None }
            }
            Err(err) => {
                tracing::warn!("Rejected {}: {}", file.name, err);
                registry.insert(TaskRecord::rejected(id, file, err.to_string()));
                Admission {
                    id,
                    rejected: Some(err),
                }
            }
        }
    }
}

/// Lower-cased media type without parameters ("text/plain; charset=utf-8" -> "text/plain")
fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Human-readable byte size: whole MB when exact, otherwise bytes
fn display_size(bytes: &u64) -> String {
    const MB: u64 = 1024 * 1024;
    let bytes = *bytes;
    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    fn filter() -> AdmissionFilter {
        AdmissionFilter::from_settings(&UploadSettings::default())
    }

    #[test]
    fn test_accepts_allowed_type() {
        let file = UploadFile::from_bytes("a.pdf", "application/pdf", vec![0u8; 10]);
        assert!(filter().check(&file).is_ok());
    }

    #[test]
    fn test_mime_parameters_are_ignored() {
        let file = UploadFile::from_bytes("a.txt", "Text/Plain; charset=utf-8", vec![0u8; 10]);
        assert!(filter().check(&file).is_ok());
    }

    #[test]
    fn test_rejects_unknown_type() {
        let file = UploadFile::from_bytes("a.png", "image/png", vec![0u8; 10]);
        let err = filter().check(&file).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedType("image/png".into()));
        assert_eq!(err.to_string(), "Invalid file type: image/png");
    }

    #[test]
    fn test_rejects_oversized_file() {
        let filter = AdmissionFilter::new(vec!["text/plain".into()], 10 * 1024 * 1024);
        let file = UploadFile {
            size_bytes: 10 * 1024 * 1024 + 1,
            ..UploadFile::from_bytes("big.txt", "text/plain", Vec::new())
        };
        let err = filter.check(&file).unwrap_err();
        assert_eq!(err.to_string(), "File exceeds 10MB limit");
    }

    #[test]
    fn test_file_at_limit_is_accepted() {
        let filter = AdmissionFilter::new(vec!["text/plain".into()], 4);
        let file = UploadFile::from_bytes("ok.txt", "text/plain", vec![0u8; 4]);
        assert!(filter.check(&file).is_ok());
    }

    #[test]
    fn test_admit_queues_valid_and_records_rejected() {
        let mut registry = TaskRegistry::new();
        let mut queue = DispatchQueue::new();
        let filter = filter();

        let ok = filter.admit(
            UploadFile::from_bytes("a.txt", "text/plain", b"hi".to_vec()),
            &mut registry,
            &mut queue,
        );
        let bad = filter.admit(
            UploadFile::from_bytes("a.exe", "application/x-msdownload", b"MZ".to_vec()),
            &mut registry,
            &mut queue,
        );

        assert!(ok.rejected.is_none());
        assert!(bad.rejected.is_some());
        assert_eq!(queue.ids(), vec![ok.id]);
        assert_eq!(registry.get(ok.id).map(TaskRecord::status), Some(TaskStatus::Pending));
        assert_eq!(registry.get(bad.id).map(TaskRecord::status), Some(TaskStatus::Failed));
    }
}
