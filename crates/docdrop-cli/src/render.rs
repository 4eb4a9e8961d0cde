// SPDX-License-Identifier: AGPL-3.0
// Docdrop CLI - Event rendering
//
// Turns queue events into one line each. Progress is printed in quarter
// steps so large batches stay readable.

use docdrop_core::{QueueEvent, QueueSummary, TaskId};
use std::collections::HashMap;

#[derive(Default)]
pub struct EventPrinter {
    names: HashMap<TaskId, String>,
    shown_progress: HashMap<TaskId, u8>,
}

impl EventPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print(&mut self, event: &QueueEvent) {
        if let Some(line) = self.line(event) {
            println!("{}", line);
        }
    }

    fn name(&self, id: &TaskId) -> &str {
        self.names.get(id).map(String::as_str).unwrap_or("<unknown>")
    }

    /// Format an event, or None if it is not worth a line
    pub fn line(&mut self, event: &QueueEvent) -> Option<String> {
        match event {
            QueueEvent::Added { id, name } => {
                self.names.insert(*id, name.clone());
                Some(format!("queued     {}", name))
            }
            QueueEvent::Rejected { id, name, error } => {
                self.names.insert(*id, name.clone());
                Some(format!("rejected   {}: {}", name, error))
            }
            QueueEvent::Started { id, attempt } => {
                self.shown_progress.insert(*id, 0);
                if *attempt > 1 {
                    Some(format!("uploading  {} (attempt {})", self.name(id), attempt))
                } else {
                    Some(format!("uploading  {}", self.name(id)))
                }
            }
            QueueEvent::Progress { id, progress } => {
                let step = (progress / 25) * 25;
                let shown = self.shown_progress.entry(*id).or_insert(0);
                if step == 0 || step == 100 || step <= *shown {
                    return None;
                }
                *shown = step;
                Some(format!("           {} {}%", self.name(id), step))
            }
            QueueEvent::Succeeded { name, doc_ref, .. } => {
                Some(format!("uploaded   {} -> {}", name, doc_ref))
            }
            QueueEvent::Failed { name, error, .. } => Some(format!("failed     {}: {}", name, error)),
            QueueEvent::Cancelled { id } => Some(format!("cancelled  {}", self.name(id))),
            QueueEvent::Retried { id } => Some(format!("retrying   {}", self.name(id))),
            QueueEvent::Removed { id } => {
                let line = format!("removed    {}", self.name(id));
                self.names.remove(id);
                self.shown_progress.remove(id);
                Some(line)
            }
            QueueEvent::Cleared { .. } => None,
        }
    }
}

pub fn summary_line(summary: &QueueSummary) -> String {
    let mut parts = vec![format!("{} uploaded", summary.succeeded)];
    if summary.failed > 0 {
        parts.push(format!("{} failed", summary.failed));
    }
    if summary.cancelled > 0 {
        parts.push(format!("{} cancelled", summary.cancelled));
    }
    format!("{} file(s): {}", summary.total, parts.join(", "))
}
