// SPDX-License-Identifier: AGPL-3.0
// Docdrop CLI - Upload command
//
// Runs one batch to completion. Failed uploads that are retry-eligible get
// up to `max_retries` more rounds once the batch settles. Ctrl-C cancels
// whatever is still queued or in flight.

use super::Stores;
use crate::error::CliError;
use crate::render::{summary_line, EventPrinter};
use clap::Args;
use docdrop_core::{
    HttpTransmitter, QueueSummary, TaskId, TaskStatus, UploadFile, UploadQueue, UploadRecord,
    UploadSettings,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

#[derive(Args)]
pub struct UploadArgs {
    /// Files to upload
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Server base URL, e.g. http://localhost:4000
    #[arg(long)]
    server: Option<String>,

    /// Bearer token sent with every upload
    #[arg(long, env = "DOCDROP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Maximum number of simultaneous uploads
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Automatic retries for failed uploads
    #[arg(long)]
    retries: Option<u32>,

    /// Persist the options above as the new defaults
    #[arg(long)]
    save: bool,
}

impl UploadArgs {
    /// Overlay command-line options on the persisted settings
    fn apply(&self, mut settings: UploadSettings) -> UploadSettings {
        if let Some(server) = &self.server {
            settings.server_url = server.clone();
        }
        if let Some(token) = &self.token {
            settings.auth_token = Some(token.clone());
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        if let Some(retries) = self.retries {
            settings.max_retries = retries;
        }
        settings
    }
}

pub async fn run(args: UploadArgs, stores: &Stores) -> Result<ExitCode, CliError> {
    let settings = args.apply(stores.settings.get());
    if args.save {
        stores.settings.update(settings.clone())?;
    } else {
        settings.validate()?;
    }

    let (files, skipped) = read_files(&args.files).await;
    if files.is_empty() {
        return Err(CliError::NoFiles);
    }

    let queue = UploadQueue::new(HttpTransmitter::new(&settings)?, &settings)?;
    tracing::info!("Uploading {} file(s) to {}", files.len(), settings.upload_url());

    let mut events = queue.subscribe();
    let ids = queue.add_files(files)?;

    let mut printer = EventPrinter::new();
    let mut retries_left = settings.max_retries;
    let mut interrupted = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => printer.print(&event),
                Err(RecvError::Lagged(missed)) => tracing::warn!("Missed {} queue events", missed),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                let cancelled = queue.cancel_all();
                eprintln!("Interrupted, cancelled {} upload(s)", cancelled);
            }
        }

        if !queue.summary().is_idle() {
            continue;
        }

        // Events from the final transition are already buffered
        loop {
            match events.try_recv() {
                Ok(event) => printer.print(&event),
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} queue events", missed)
                }
                Err(_) => break,
            }
        }

        let retryable = retryable_failures(&queue, &ids);
        if interrupted || retries_left == 0 || retryable.is_empty() {
            break;
        }
        retries_left -= 1;
        tokio::time::sleep(Duration::from_millis(settings.retry_delay_ms)).await;
        for id in retryable {
            queue.retry(id)?;
        }
    }

    queue.shutdown();

    let records: Vec<UploadRecord> = queue
        .snapshot()
        .iter()
        .filter_map(UploadRecord::from_snapshot)
        .collect();
    if let Err(e) = stores.history.add_all(records) {
        tracing::error!("Failed to record upload history: {}", e);
    }

    let summary = queue.summary();
    println!("{}", summary_line(&summary));
    if skipped > 0 {
        println!("{} path(s) skipped", skipped);
    }
    if batch_succeeded(&summary, skipped) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Open every path, reporting the ones that cannot be read. Returns the files and the skip count.
async fn read_files(paths: &[PathBuf]) -> (Vec<UploadFile>, usize) {
    let mut files = Vec::with_capacity(paths.len());
    let mut skipped = 0;
    for path in paths {
        match UploadFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                skipped += 1;
                eprintln!("Skipping {}: {}", path.display(), e);
            }
        }
    }
    (files, skipped)
}

/// A batch only succeeds if every requested path was uploaded
fn batch_succeeded(summary: &QueueSummary, skipped: usize) -> bool {
    skipped == 0 && summary.failed == 0 && summary.cancelled == 0
}

fn retryable_failures(queue: &UploadQueue<HttpTransmitter>, ids: &[TaskId]) -> Vec<TaskId> {
    ids.iter()
        .copied()
        .filter(|id| {
            queue
                .task(*id)
                .map(|task| task.status == TaskStatus::Failed && task.retryable)
                .unwrap_or(false)
        })
        .collect()
}
