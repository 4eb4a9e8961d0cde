// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Settings persistence
//
// Settings are stored in a local JSON file next to the upload history.

use crate::types::{AppError, UploadSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Directory holding settings.json and history.json, created on demand
pub fn config_dir() -> Result<PathBuf, AppError> {
    let config_dir = directories::ProjectDirs::from("com", "docdrop", "docdrop")
        .ok_or_else(|| AppError::FileIo("Could not determine config directory".to_string()))?
        .config_dir()
        .to_path_buf();

    fs::create_dir_all(&config_dir)
        .map_err(|e| AppError::FileIo(format!("Failed to create config dir: {}", e)))?;

    Ok(config_dir)
}

/// In-memory cache of settings, persisted to disk on changes
pub struct SettingsStore {
    settings: RwLock<UploadSettings>,
    file_path: PathBuf,
}

impl SettingsStore {
    /// Open the settings file in the platform config directory
    pub fn new() -> Result<Self, AppError> {
        Self::at(config_dir()?.join("settings.json"))
    }

    /// Open a settings file at an explicit path, writing defaults if it is missing
    pub fn at(file_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let file_path = file_path.into();
        tracing::info!("Settings file path: {:?}", file_path);

        let settings = if file_path.exists() {
            let content = fs::read_to_string(&file_path)
                .map_err(|e| AppError::FileIo(format!("Failed to read settings: {}", e)))?;

            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse settings, using defaults: {}", e);
                UploadSettings::default()
            })
        } else {
            tracing::info!("No settings file found, using defaults");
            UploadSettings::default()
        };

        let store = Self {
            settings: RwLock::new(settings),
            file_path,
        };

        if !store.file_path.exists() {
            tracing::info!("Creating initial settings file");
            store.persist()?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn persist(&self) -> Result<(), AppError> {
        let content = {
            let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*settings).map_err(|e| {
                AppError::Serialization(format!("Failed to serialize settings: {}", e))
            })?
        };

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::FileIo(format!("Failed to create config dir: {}", e)))?;
        }
        fs::write(&self.file_path, content)
            .map_err(|e| AppError::FileIo(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> UploadSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate, replace and persist settings
    pub fn update(&self, new_settings: UploadSettings) -> Result<(), AppError> {
        new_settings.validate()?;
        {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            *settings = new_settings;
        }

        let result = self.persist();
        match &result {
            Ok(()) => tracing::info!("Settings persisted successfully"),
            Err(e) => tracing::error!("Failed to persist settings: {}", e),
        }
        result
    }
}
