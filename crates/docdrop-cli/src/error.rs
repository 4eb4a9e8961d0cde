// SPDX-License-Identifier: AGPL-3.0
// Docdrop CLI - Error reporting

use docdrop_core::{AppError, QueueError};
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("No readable files to upload")]
    NoFiles,
}

impl CliError {
    /// Print the error with a hint where one helps, and return the exit code
    pub fn report(&self) -> ExitCode {
        eprintln!("Error: {}", self);

        match self {
            CliError::App(AppError::InvalidConfig(_)) => {
                eprintln!();
                eprintln!("Check the values passed on the command line or run `docdrop settings`");
                eprintln!("to see the persisted configuration.");
            }
            CliError::App(AppError::FileIo(_)) => {
                eprintln!();
                eprintln!("Use --config-dir to store settings and history elsewhere.");
            }
            _ => {}
        }

        ExitCode::FAILURE
    }
}
