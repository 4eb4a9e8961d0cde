// SPDX-License-Identifier: AGPL-3.0
// Docdrop CLI - Subcommands
//
// - upload: run a batch through the upload queue
// - history: list or clear uploaded documents
// - settings: print the persisted settings

pub mod history;
pub mod settings;
pub mod upload;

use crate::error::CliError;
use docdrop_core::{SettingsStore, UploadHistory};
use std::path::PathBuf;

/// Settings and history, opened from the same directory
pub struct Stores {
    pub settings: SettingsStore,
    pub history: UploadHistory,
}

impl Stores {
    pub fn open(config_dir: Option<PathBuf>) -> Result<Self, CliError> {
        let stores = match config_dir {
            Some(dir) => Self {
                // Settings are opened first so the directory exists for history writes
                settings: SettingsStore::at(dir.join("settings.json"))?,
                history: UploadHistory::at(dir.join("history.json"))?,
            },
            None => Self {
                settings: SettingsStore::new()?,
                history: UploadHistory::new()?,
            },
        };
        Ok(stores)
    }
}
