// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Queue events and summary

use crate::task::{TaskId, TaskRecord, TaskStatus};
use crate::transmit::UploadedDocRef;
use serde::Serialize;

/// Events emitted by the upload queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueueEvent {
    /// A file passed admission and is waiting for a slot
    Added { id: TaskId, name: String },
    /// A file failed admission
    Rejected {
        id: TaskId,
        name: String,
        error: String,
    },
    /// An upload started
    Started { id: TaskId, attempt: u32 },
    /// Upload progress moved forward
    Progress { id: TaskId, progress: u8 },
    /// An upload completed
    #[serde(rename_all = "camelCase")]
    Succeeded {
        id: TaskId,
        name: String,
        doc_ref: UploadedDocRef,
    },
    /// An upload failed in transit
    Failed {
        id: TaskId,
        name: String,
        error: String,
    },
    /// A queued or running upload was cancelled
    Cancelled { id: TaskId },
    /// A failed upload went back to the queue
    Retried { id: TaskId },
    /// A task was deleted from the queue
    Removed { id: TaskId },
    /// Completed tasks were cleared from the queue
    Cleared { count: usize },
}

/// Counts of tasks per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Any task still queued or uploading
    pub has_cancellable: bool,
}

impl QueueSummary {
    pub(crate) fn tally<'a>(records: impl Iterator<Item = &'a TaskRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total += 1;
            match record.status() {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::Uploading => summary.uploading += 1,
                TaskStatus::Success => summary.succeeded += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary.has_cancellable = summary.pending + summary.uploading > 0;
        summary
    }

    /// No task is queued or uploading
    pub fn is_idle(&self) -> bool {
        !self.has_cancellable
    }
}
