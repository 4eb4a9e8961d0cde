// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Shared logic for all frontends
//
// This crate provides:
// - UploadQueue, a bounded-concurrency scheduler for document uploads
// - AdmissionFilter for type and size checks
// - Transmitter, the transport seam, and HttpTransmitter as its HTTP implementation
// - SettingsStore and UploadHistory for local persistence
//
// Frontend-specific code lives in separate crates.

pub mod admission;
pub mod dispatch;
pub mod events;
pub mod gate;
pub mod history;
pub mod http;
pub mod queue;
pub(crate) mod registry;
pub mod scheduler;
pub mod settings;
pub mod task;
pub mod transmit;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use admission::{AdmissionFilter, ValidationError};
pub use events::{QueueEvent, QueueSummary};
pub use history::{UploadHistory, UploadRecord};
pub use http::HttpTransmitter;
pub use queue::UploadQueue;
pub use scheduler::QueueError;
pub use settings::SettingsStore;
pub use task::{TaskId, TaskSnapshot, TaskStatus, CANCELLED_BY_TRANSPORT, CANCELLED_BY_USER};
pub use transmit::{
    FileSource, ProgressReporter, TransmitError, Transmitter, UploadFile, UploadedDocRef,
};
pub use types::{AppError, UploadSettings, DEFAULT_ALLOWED_TYPES};
