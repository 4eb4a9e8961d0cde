// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Upload task records
//
// A task tracks one file from admission until it is removed. The
// observable shape is TaskSnapshot; the record itself stays inside the
// queue so every change goes through the same update path.

use crate::gate::Slot;
use crate::transmit::{UploadFile, UploadedDocRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Error text shown on tasks cancelled by the user
pub const CANCELLED_BY_USER: &str = "Cancelled by user";

/// Error text shown when the transport gave up without a user request
pub const CANCELLED_BY_TRANSPORT: &str = "Cancelled by transport";

/// Opaque task identifier, stable for the lifetime of the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of an upload task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Success,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether the task is queued or in flight
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Uploading)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Resources a task owns while its upload is in flight.
///
/// Moved out of the task on every exit from `Uploading`, so the slot is
/// released and the cancel token dropped exactly once.
#[derive(Debug)]
pub(crate) struct InFlight {
    pub slot: Slot,
    pub cancel: CancellationToken,
    pub attempt: u32,
}

/// Why a task ended up failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    pub reason: String,
    /// Admission rejections are not retryable; transport failures are
    pub retryable: bool,
}

/// Who stopped a cancelled task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelOrigin {
    User,
    Transport,
}

impl CancelOrigin {
    fn marker(self) -> &'static str {
        match self {
            Self::User => CANCELLED_BY_USER,
            Self::Transport => CANCELLED_BY_TRANSPORT,
        }
    }
}

/// Internal lifecycle state carrying the per-state payload
#[derive(Debug)]
pub(crate) enum Phase {
    Pending,
    Uploading(InFlight),
    Success {
        doc_ref: UploadedDocRef,
        completed_at: DateTime<Utc>,
    },
    Failed(Failure),
    Cancelled(CancelOrigin),
}

impl Phase {
    pub fn status(&self) -> TaskStatus {
        match self {
            Phase::Pending => TaskStatus::Pending,
            Phase::Uploading(_) => TaskStatus::Uploading,
            Phase::Success { .. } => TaskStatus::Success,
            Phase::Failed(_) => TaskStatus::Failed,
            Phase::Cancelled(_) => TaskStatus::Cancelled,
        }
    }
}

/// One file's upload lifecycle record
#[derive(Debug)]
pub(crate) struct TaskRecord {
    pub id: TaskId,
    pub file: UploadFile,
    pub progress: u8,
    pub attempts: u32,
    pub phase: Phase,
}

impl TaskRecord {
    pub fn pending(id: TaskId, file: UploadFile) -> Self {
        Self {
            id,
            file,
            progress: 0,
            attempts: 0,
            phase: Phase::Pending,
        }
    }

    pub fn rejected(id: TaskId, file: UploadFile, reason: String) -> Self {
        Self {
            id,
            file,
            progress: 0,
            attempts: 0,
            phase: Phase::Failed(Failure {
                reason,
                retryable: false,
            }),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.phase.status()
    }

    /// Current attempt number when the task is in flight
    pub fn in_flight_attempt(&self) -> Option<u32> {
        match &self.phase {
            Phase::Uploading(flight) => Some(flight.attempt),
            _ => None,
        }
    }

    /// Replace the phase, handing back in-flight resources if the task was uploading
    pub fn leave_phase(&mut self, next: Phase) -> Option<InFlight> {
        match std::mem::replace(&mut self.phase, next) {
            Phase::Uploading(flight) => Some(flight),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let (error, result_ref, completed_at) = match &self.phase {
            Phase::Failed(failure) => (Some(failure.reason.clone()), None, None),
            Phase::Cancelled(origin) => (Some(origin.marker().to_string()), None, None),
            Phase::Success {
                doc_ref,
                completed_at,
            } => (None, Some(doc_ref.clone()), Some(*completed_at)),
            Phase::Pending | Phase::Uploading(_) => (None, None, None),
        };
        let retryable = matches!(&self.phase, Phase::Failed(f) if f.retryable);

        TaskSnapshot {
            id: self.id,
            name: self.file.name.clone(),
            size_bytes: self.file.size_bytes,
            mime_type: self.file.mime_type.clone(),
            status: self.status(),
            progress: self.progress,
            attempts: self.attempts,
            retryable,
            error,
            result_ref,
            completed_at,
        }
    }
}

/// Observable state of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub status: TaskStatus,
    /// Percentage 0..=100
    pub progress: u8,
    /// Number of times the task has been dispatched
    pub attempts: u32,
    /// Whether `retry` would re-queue the task
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<UploadedDocRef>,
    /// When the upload succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
