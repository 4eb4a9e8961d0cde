// SPDX-License-Identifier: AGPL-3.0
// Docdrop CLI - Settings command

use super::Stores;
use crate::error::CliError;
use docdrop_core::AppError;
use std::process::ExitCode;

pub fn run(stores: &Stores) -> Result<ExitCode, CliError> {
    let mut settings = stores.settings.get();
    if settings.auth_token.is_some() {
        settings.auth_token = Some("********".to_string());
    }

    let json = serde_json::to_string_pretty(&settings).map_err(AppError::from)?;
    println!("# {}", stores.settings.path().display());
    println!("{}", json);
    Ok(ExitCode::SUCCESS)
}
