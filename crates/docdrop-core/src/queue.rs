// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Upload queue
//
// Public face of the scheduler. An UploadQueue is created once, handed to
// whatever frontend drives it, and torn down with `shutdown`.

use crate::admission::AdmissionFilter;
use crate::events::{QueueEvent, QueueSummary};
use crate::scheduler::{CancelOutcome, QueueError, Scheduler};
use crate::task::{TaskId, TaskSnapshot, TaskStatus};
use crate::transmit::{Transmitter, UploadFile};
use crate::types::{AppError, UploadSettings};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};

/// Capacity of the event channel; slow subscribers see `Lagged`
const EVENT_CAPACITY: usize = 256;

/// Bounded-concurrency upload queue
pub struct UploadQueue<T: Transmitter> {
    scheduler: Arc<Scheduler<T>>,
}

impl<T: Transmitter> Clone for UploadQueue<T> {
    fn clone(&self) -> Self {
        Self {
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<T: Transmitter> UploadQueue<T> {
    /// Create a queue on the current Tokio runtime
    pub fn new(transmitter: T, settings: &UploadSettings) -> Result<Self, AppError> {
        let runtime = Handle::try_current().map_err(|e| AppError::Runtime(e.to_string()))?;
        Self::with_runtime(transmitter, settings, runtime)
    }

    /// Create a queue that spawns its uploads on `runtime`
    pub fn with_runtime(
        transmitter: T,
        settings: &UploadSettings,
        runtime: Handle,
    ) -> Result<Self, AppError> {
        settings.validate()?;
        tracing::info!(
            "Upload queue ready: concurrency {}, max file size {} bytes",
            settings.concurrency,
            settings.max_file_bytes
        );

        let scheduler = Scheduler::new(
            transmitter,
            AdmissionFilter::from_settings(settings),
            settings.concurrency,
            EVENT_CAPACITY,
            runtime,
        );
        Ok(Self {
            scheduler: Arc::new(scheduler),
        })
    }

    /// Admit files and start as many uploads as the limit allows.
    ///
    /// Returns the new task ids in input order, including ids of files
    /// that were rejected at admission.
    pub fn add_files(
        &self,
        files: impl IntoIterator<Item = UploadFile>,
    ) -> Result<Vec<TaskId>, QueueError> {
        let filter = &self.scheduler.filter;
        let ids = self.scheduler.update(|state, events| {
            if state.closed {
                return Err(QueueError::Closed);
            }

            let mut ids = Vec::new();
            let mut rejected = 0;
            for file in files {
                let name = file.name.clone();
                let admission = filter.admit(file, &mut state.registry, &mut state.queue);
                match admission.rejected {
                    None => events.push(QueueEvent::Added {
                        id: admission.id,
                        name,
                    }),
                    Some(err) => {
                        rejected += 1;
                        events.push(QueueEvent::Rejected {
                            id: admission.id,
                            name,
                            error: err.to_string(),
                        });
                    }
                }
                ids.push(admission.id);
            }

            tracing::info!("Added {} file(s), {} rejected", ids.len(), rejected);
            Ok(ids)
        })?;

        self.scheduler.signal();
        Ok(ids)
    }

    /// Cancel a pending or uploading task.
    ///
    /// Returns true if the task changed state; cancelling a finished or
    /// unknown task does nothing.
    pub fn cancel(&self, id: TaskId) -> bool {
        let outcome = self
            .scheduler
            .update(|state, events| state.cancel_task(id, events));
        if outcome == CancelOutcome::Aborted {
            self.scheduler.signal();
        }
        outcome.changed()
    }

    /// Cancel every pending and uploading task. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let (cancelled, aborted) = self.scheduler.update(|state, events| {
            let mut cancelled = 0;
            let mut aborted = false;
            for id in state.registry.ids() {
                let outcome = state.cancel_task(id, events);
                if outcome.changed() {
                    cancelled += 1;
                }
                aborted |= outcome == CancelOutcome::Aborted;
            }
            (cancelled, aborted)
        });

        if cancelled > 0 {
            tracing::info!("Cancelled {} upload(s)", cancelled);
        }
        if aborted {
            self.scheduler.signal();
        }
        cancelled
    }

    /// Put a failed upload back at the end of the queue
    pub fn retry(&self, id: TaskId) -> Result<(), QueueError> {
        self.scheduler
            .update(|state, events| state.retry_task(id, events))?;
        self.scheduler.signal();
        Ok(())
    }

    /// Cancel the task if needed, then delete it. Returns its final state.
    pub fn remove(&self, id: TaskId) -> Option<TaskSnapshot> {
        let (removed, aborted) = self.scheduler.update(|state, events| {
            let outcome = state.cancel_task(id, events);
            if outcome == CancelOutcome::NotFound {
                return (None, false);
            }
            state.queue.remove(id);
            let record = state.registry.remove(id);
            if record.is_some() {
                events.push(QueueEvent::Removed { id });
            }
            (
                record.map(|r| r.snapshot()),
                outcome == CancelOutcome::Aborted,
            )
        });

        if aborted {
            self.scheduler.signal();
        }
        removed
    }

    /// Drop every successfully uploaded task. Returns how many were dropped.
    pub fn clear_completed(&self) -> usize {
        self.scheduler.update(|state, events| {
            let count = state
                .registry
                .remove_where(|record| record.status() == TaskStatus::Success);
            if count > 0 {
                events.push(QueueEvent::Cleared { count });
            }
            count
        })
    }

    /// Every task in admission order
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.scheduler
            .lock()
            .registry
            .iter()
            .map(|record| record.snapshot())
            .collect()
    }

    pub fn task(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.scheduler
            .lock()
            .registry
            .get(id)
            .map(|record| record.snapshot())
    }

    pub fn summary(&self) -> QueueSummary {
        self.scheduler.lock().summary()
    }

    /// Number of uploads currently holding a slot
    pub fn active_count(&self) -> usize {
        self.scheduler.lock().gate.active_count()
    }

    /// Ids waiting for a slot, next to start first
    pub fn queued_ids(&self) -> Vec<TaskId> {
        self.scheduler.lock().queue.ids()
    }

    pub fn concurrency_limit(&self) -> usize {
        self.scheduler.lock().gate.limit()
    }

    /// Subscribe to queue events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.scheduler.subscribe()
    }

    /// Watch the per-state task counts
    pub fn watch_summary(&self) -> watch::Receiver<QueueSummary> {
        self.scheduler.watch_summary()
    }

    /// Wait until no task is pending or uploading
    pub async fn wait_idle(&self) {
        let mut summary = self.scheduler.watch_summary();
        let _ = summary.wait_for(QueueSummary::is_idle).await;
    }

    /// Stop accepting files and cancel everything still in progress
    pub fn shutdown(&self) -> usize {
        self.scheduler.update(|state, _| state.closed = true);
        let cancelled = self.cancel_all();
        tracing::info!("Upload queue shut down");
        cancelled
    }

    pub fn is_closed(&self) -> bool {
        self.scheduler.lock().closed
    }
}
