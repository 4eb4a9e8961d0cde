// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Scheduler loop
//
// All queue state lives in one QueueState behind one mutex. Public
// operations, progress callbacks and transmission outcomes all go through
// Scheduler::update, which applies a transition and publishes the
// resulting events while the lock is held, so observers see every task's
// states in order.
//
// The pump is single-flight: `signal` starts it only when it is not
// already running, and the running pump keeps draining until it finds no
// dispatchable work under the lock. Slot reservation and the
// Pending -> Uploading flip happen in the same critical section.

use crate::admission::AdmissionFilter;
use crate::dispatch::DispatchQueue;
use crate::events::{QueueEvent, QueueSummary};
use crate::gate::ConcurrencyGate;
use crate::registry::TaskRegistry;
use crate::task::{CancelOrigin, Failure, InFlight, Phase, TaskId, TaskStatus};
use crate::transmit::{ProgressReporter, TransmitError, Transmitter, UploadFile, UploadedDocRef};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Errors returned by queue operations that name a specific task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Task {id} is {status} and cannot be retried")]
    NotRetryable { id: TaskId, status: TaskStatus },

    #[error("Upload queue has been shut down")]
    Closed,
}

/// Effect of a cancel request on one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelOutcome {
    NotFound,
    /// Already terminal
    Unchanged,
    /// Was pending; removed from the dispatch queue
    Dequeued,
    /// Was uploading; cancel token fired and slot released
    Aborted,
}

impl CancelOutcome {
    pub fn changed(self) -> bool {
        matches!(self, Self::Dequeued | Self::Aborted)
    }
}

/// Work handed from the pump to a spawned transmission
#[derive(Debug)]
struct Dispatch {
    id: TaskId,
    attempt: u32,
    file: UploadFile,
    cancel: CancellationToken,
}

/// Registry, dispatch queue and gate, mutated together
#[derive(Debug)]
pub(crate) struct QueueState {
    pub registry: TaskRegistry,
    pub queue: DispatchQueue,
    pub gate: ConcurrencyGate,
    pumping: bool,
    pub closed: bool,
}

impl QueueState {
    fn new(limit: usize) -> Self {
        Self {
            registry: TaskRegistry::new(),
            queue: DispatchQueue::new(),
            gate: ConcurrencyGate::new(limit),
            pumping: false,
            closed: false,
        }
    }

    pub fn summary(&self) -> QueueSummary {
        QueueSummary::tally(self.registry.iter())
    }

    /// Pop queued ids until one can start, reserving its slot and marking it uploading
    fn next_dispatch(&mut self, events: &mut Vec<QueueEvent>) -> Option<Dispatch> {
        while self.gate.has_free_slot() {
            let id = self.queue.dequeue_next()?;

            let Some(record) = self.registry.get_mut(id) else {
                tracing::debug!("Skipping removed task {}", id);
                continue;
            };
            if !matches!(record.phase, Phase::Pending) {
                tracing::debug!("Skipping task {} in state {}", id, record.status());
                continue;
            }

            let Some(slot) = self.gate.reserve(id) else {
                debug_assert!(false, "pending task {} already holds a slot", id);
                tracing::error!("Pending task {} already holds a slot", id);
                continue;
            };

            let cancel = CancellationToken::new();
            record.attempts += 1;
            record.progress = 0;
            let attempt = record.attempts;
            record.leave_phase(Phase::Uploading(InFlight {
                slot,
                cancel: cancel.clone(),
                attempt,
            }));

            events.push(QueueEvent::Started { id, attempt });
            return Some(Dispatch {
                id,
                attempt,
                file: record.file.clone(),
                cancel,
            });
        }
        None
    }

    /// Record a progress report from attempt `attempt` of task `id`
    fn record_progress(&mut self, id: TaskId, attempt: u32, percent: u8, events: &mut Vec<QueueEvent>) {
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };
        if record.in_flight_attempt() != Some(attempt) {
            return;
        }
        let percent = percent.min(100);
        if percent > record.progress {
            record.progress = percent;
            tracing::debug!("{}: {}%", record.file.name, percent);
            events.push(QueueEvent::Progress {
                id,
                progress: percent,
            });
        }
    }

    /// Apply a transmission outcome. Returns true if a slot was released.
    fn finish(
        &mut self,
        id: TaskId,
        attempt: u32,
        outcome: Result<UploadedDocRef, TransmitError>,
        events: &mut Vec<QueueEvent>,
    ) -> bool {
        let Some(record) = self.registry.get_mut(id) else {
            tracing::debug!("Ignoring outcome for removed task {}", id);
            return false;
        };
        if record.in_flight_attempt() != Some(attempt) {
            tracing::debug!("Ignoring late outcome for task {} ({})", id, record.status());
            return false;
        }

        let name = record.file.name.clone();
        let next = match outcome {
            Ok(doc_ref) => {
                tracing::info!("Uploaded {} as {}", name, doc_ref);
                record.progress = 100;
                events.push(QueueEvent::Succeeded {
                    id,
                    name,
                    doc_ref: doc_ref.clone(),
                });
                Phase::Success {
                    doc_ref,
                    completed_at: Utc::now(),
                }
            }
            Err(TransmitError::Transport(reason)) => {
                tracing::warn!("Upload of {} failed: {}", name, reason);
                events.push(QueueEvent::Failed {
                    id,
                    name,
                    error: reason.clone(),
                });
                Phase::Failed(Failure {
                    reason,
                    retryable: true,
                })
            }
            Err(TransmitError::Cancelled) => {
                tracing::info!("Upload of {} cancelled by transport", name);
                events.push(QueueEvent::Cancelled { id });
                Phase::Cancelled(CancelOrigin::Transport)
            }
        };

        if let Some(flight) = record.leave_phase(next) {
            self.gate.release(flight.slot);
        }
        true
    }

    pub fn cancel_task(&mut self, id: TaskId, events: &mut Vec<QueueEvent>) -> CancelOutcome {
        let Some(record) = self.registry.get_mut(id) else {
            return CancelOutcome::NotFound;
        };

        let outcome = match record.status() {
            TaskStatus::Pending => {
                self.queue.remove(id);
                record.leave_phase(Phase::Cancelled(CancelOrigin::User));
                CancelOutcome::Dequeued
            }
            TaskStatus::Uploading => {
                if let Some(flight) = record.leave_phase(Phase::Cancelled(CancelOrigin::User)) {
                    flight.cancel.cancel();
                    self.gate.release(flight.slot);
                }
                CancelOutcome::Aborted
            }
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled => {
                return CancelOutcome::Unchanged;
            }
        };

        tracing::info!("Cancelled {}", record.file.name);
        events.push(QueueEvent::Cancelled { id });
        outcome
    }

    pub fn retry_task(&mut self, id: TaskId, events: &mut Vec<QueueEvent>) -> Result<(), QueueError> {
        let record = self
            .registry
            .get_mut(id)
            .ok_or(QueueError::UnknownTask(id))?;

        if !matches!(&record.phase, Phase::Failed(failure) if failure.retryable) {
            return Err(QueueError::NotRetryable {
                id,
                status: record.status(),
            });
        }

        record.leave_phase(Phase::Pending);
        record.progress = 0;
        self.queue.enqueue_if_absent(id);

        tracing::info!("Retrying {}", record.file.name);
        events.push(QueueEvent::Retried { id });
        Ok(())
    }
}

/// Shared scheduler state behind every UploadQueue handle
pub(crate) struct Scheduler<T> {
    state: Mutex<QueueState>,
    pub filter: AdmissionFilter,
    transmitter: Arc<T>,
    events: broadcast::Sender<QueueEvent>,
    summary: watch::Sender<QueueSummary>,
    runtime: Handle,
}

impl<T: Transmitter> Scheduler<T> {
    pub fn new(
        transmitter: T,
        filter: AdmissionFilter,
        limit: usize,
        event_capacity: usize,
        runtime: Handle,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        let (summary, _) = watch::channel(QueueSummary::default());

        Self {
            state: Mutex::new(QueueState::new(limit)),
            filter,
            transmitter: Arc::new(transmitter),
            events,
            summary,
            runtime,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one state transition and publish what it produced
    pub fn update<R>(&self, apply: impl FnOnce(&mut QueueState, &mut Vec<QueueEvent>) -> R) -> R {
        let mut events = Vec::new();
        let mut state = self.lock();
        let result = apply(&mut state, &mut events);

        if !events.is_empty() {
            let summary = state.summary();
            self.summary.send_if_modified(|current| {
                if *current == summary {
                    return false;
                }
                *current = summary;
                true
            });
            for event in events {
                // No subscribers is fine
                let _ = self.events.send(event);
            }
        }
        result
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub fn watch_summary(&self) -> watch::Receiver<QueueSummary> {
        self.summary.subscribe()
    }

    /// Fill free slots from the dispatch queue
    pub fn signal(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            if state.pumping {
                // The running pump re-checks the queue before it stops
                return;
            }
            state.pumping = true;
        }

        loop {
            let next = self.update(|state, events| {
                let next = if state.closed {
                    None
                } else {
                    state.next_dispatch(events)
                };
                if next.is_none() {
                    state.pumping = false;
                }
                next
            });

            match next {
                Some(dispatch) => self.launch(dispatch),
                None => break,
            }
        }
    }

    fn launch(self: &Arc<Self>, dispatch: Dispatch) {
        let Dispatch {
            id,
            attempt,
            file,
            cancel,
        } = dispatch;
        tracing::info!("Uploading {} (attempt {})", file.name, attempt);

        let progress = {
            let scheduler = Arc::downgrade(self);
            ProgressReporter::new(move |percent| {
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.update(|state, events| {
                        state.record_progress(id, attempt, percent, events)
                    });
                }
            })
        };

        let scheduler = Arc::clone(self);
        let transmitter = Arc::clone(&self.transmitter);
        self.runtime.spawn(async move {
            let outcome = transmitter.transmit(file, progress, cancel).await;
            scheduler.complete(id, attempt, outcome);
        });
    }

    fn complete(self: &Arc<Self>, id: TaskId, attempt: u32, outcome: Result<UploadedDocRef, TransmitError>) {
        let released = self.update(|state, events| state.finish(id, attempt, outcome, events));
        if released {
            self.signal();
        }
    }
}
