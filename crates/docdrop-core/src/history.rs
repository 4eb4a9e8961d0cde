// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Upload history persistence
//
// Stores successfully uploaded documents in a local JSON file so their
// references can be looked up after the queue is gone.

use crate::settings::config_dir;
use crate::task::TaskSnapshot;
use crate::transmit::UploadedDocRef;
use crate::types::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

/// Maximum number of history entries to keep
const MAX_HISTORY_ENTRIES: usize = 100;

/// One uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub doc_ref: UploadedDocRef,
    pub name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Build a record from a successful task; None for any other state
    pub fn from_snapshot(task: &TaskSnapshot) -> Option<Self> {
        let doc_ref = task.result_ref.clone()?;
        Some(Self {
            doc_ref,
            name: task.name.clone(),
            size_bytes: task.size_bytes,
            uploaded_at: task.completed_at.unwrap_or_else(Utc::now),
        })
    }
}

/// File-based upload history storage
pub struct UploadHistory {
    records: RwLock<Vec<UploadRecord>>,
    file_path: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct HistoryFile {
    records: Vec<UploadRecord>,
}

impl UploadHistory {
    /// Open the history file in the platform config directory
    pub fn new() -> Result<Self, AppError> {
        Self::at(config_dir()?.join("history.json"))
    }

    /// Open a history file at an explicit path
    pub fn at(file_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let file_path = file_path.into();

        let records = if file_path.exists() {
            let content = fs::read_to_string(&file_path)
                .map_err(|e| AppError::FileIo(format!("Failed to read history: {}", e)))?;

            let file: HistoryFile = serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse history, starting fresh: {}", e);
                HistoryFile {
                    records: Vec::new(),
                }
            });

            file.records
        } else {
            Vec::new()
        };

        Ok(Self {
            records: RwLock::new(records),
            file_path,
        })
    }

    fn persist(&self) -> Result<(), AppError> {
        let content = {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            let file = HistoryFile {
                records: records.clone(),
            };
            serde_json::to_string_pretty(&file).map_err(|e| {
                AppError::Serialization(format!("Failed to serialize history: {}", e))
            })?
        };

        fs::write(&self.file_path, content)
            .map_err(|e| AppError::FileIo(format!("Failed to write history: {}", e)))?;

        Ok(())
    }

    /// All upload records, most recent first
    pub fn list(&self) -> Vec<UploadRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Add new records and persist once
    pub fn add_all(&self, new_records: impl IntoIterator<Item = UploadRecord>) -> Result<usize, AppError> {
        let added = {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            let mut added = 0;
            for record in new_records {
                records.insert(0, record);
                added += 1;
            }
            records.truncate(MAX_HISTORY_ENTRIES);
            added
        };

        if added > 0 {
            self.persist()?;
        }
        Ok(added)
    }

    /// Add a single record
    pub fn add(&self, record: UploadRecord) -> Result<(), AppError> {
        self.add_all([record]).map(|_| ())
    }

    /// Clear all history
    pub fn clear(&self) -> Result<(), AppError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        self.persist()
    }

    /// Get the count of history entries
    pub fn count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
