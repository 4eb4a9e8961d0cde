// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Test transmitter
//
// Uploads stay in flight until the test resolves them by file name.

use crate::transmit::{ProgressReporter, TransmitError, Transmitter, UploadFile, UploadedDocRef};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

type Outcome = Result<UploadedDocRef, TransmitError>;

struct Call {
    outcome: oneshot::Sender<Outcome>,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

#[derive(Clone, Default)]
pub struct ScriptedTransmitter {
    calls: Arc<Mutex<HashMap<String, Call>>>,
    started: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every transmit call, in call order
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    /// How many times `name` has been transmitted
    pub fn attempts(&self, name: &str) -> usize {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == name)
            .count()
    }

    pub fn in_flight(&self, name: &str) -> bool {
        self.calls.lock().unwrap().contains_key(name)
    }

    pub fn was_cancelled(&self, name: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .get(name)
            .map(|call| call.cancel.is_cancelled())
            .unwrap_or(false)
    }

    /// Wait for the transmit call for `name` to be registered
    pub async fn wait_started(&self, name: &str) {
        let calls = self.calls.clone();
        let name = name.to_string();
        eventually(move || calls.lock().unwrap().contains_key(&name)).await;
    }

    pub async fn progress(&self, name: &str, percent: u8) {
        self.wait_started(name).await;
        let reporter = self.calls.lock().unwrap().get(name).map(|c| c.progress.clone());
        if let Some(reporter) = reporter {
            reporter.report(percent);
        }
    }

    pub async fn succeed(&self, name: &str, doc_ref: &str) {
        self.resolve(name, Ok(UploadedDocRef(doc_ref.to_string())))
            .await;
    }

    pub async fn fail(&self, name: &str, reason: &str) {
        self.resolve(name, Err(TransmitError::Transport(reason.to_string())))
            .await;
    }

    async fn resolve(&self, name: &str, outcome: Outcome) {
        self.wait_started(name).await;
        let call = self.calls.lock().unwrap().remove(name);
        if let Some(call) = call {
            let _ = call.outcome.send(outcome);
        }
        // let the upload task observe the outcome
        settle().await;
    }
}

impl Transmitter for ScriptedTransmitter {
    fn transmit(
        &self,
        file: UploadFile,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> impl Future<Output = Outcome> + Send {
        let (tx, rx) = oneshot::channel();
        self.started.lock().unwrap().push(file.name.clone());
        self.calls.lock().unwrap().insert(
            file.name.clone(),
            Call {
                outcome: tx,
                progress,
                cancel: cancel.clone(),
            },
        );

        async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(TransmitError::Cancelled),
                outcome = rx => outcome.unwrap_or_else(|_| Err(TransmitError::Transport("dropped".into()))),
            }
        }
    }
}

/// Completes every upload on its own after a short delay, counting calls
/// per file name and the number of transmissions running at once.
#[derive(Clone, Default)]
pub struct CountingTransmitter {
    calls: Arc<Mutex<HashMap<String, usize>>>,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl CountingTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn max_calls(&self) -> usize {
        self.calls.lock().unwrap().values().copied().max().unwrap_or(0)
    }

    /// Most transmissions observed running at the same time
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Transmitter for CountingTransmitter {
    fn transmit(
        &self,
        file: UploadFile,
        _progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> impl Future<Output = Outcome> + Send {
        let calls = self.calls.clone();
        let live = self.live.clone();
        let peak = self.peak.clone();

        async move {
            *calls.lock().unwrap().entry(file.name.clone()).or_insert(0) += 1;
            let running = live.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(running, Ordering::SeqCst);

            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(TransmitError::Cancelled),
                _ = tokio::time::sleep(Duration::from_micros(200)) => {
                    Ok(UploadedDocRef(file.name.clone()))
                }
            };

            // Leave before the queue learns the outcome and frees the slot
            live.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }
}

/// Yield until `condition` holds, panicking if it never does
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Give spawned upload tasks a chance to run
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn text_file(name: &str) -> UploadFile {
    UploadFile::from_bytes(name, "text/plain", format!("contents of {}", name).into_bytes())
}
