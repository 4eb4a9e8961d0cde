// SPDX-License-Identifier: AGPL-3.0
// Docdrop CLI - History command

use super::Stores;
use crate::error::CliError;
use chrono::Local;
use clap::Args;
use docdrop_core::{AppError, UploadRecord};
use std::process::ExitCode;

#[derive(Args)]
pub struct HistoryArgs {
    /// Remove all history entries
    #[arg(long)]
    clear: bool,

    /// Print records as JSON
    #[arg(long, conflicts_with = "clear")]
    json: bool,
}

pub fn run(args: HistoryArgs, stores: &Stores) -> Result<ExitCode, CliError> {
    if args.clear {
        let count = stores.history.count();
        stores.history.clear()?;
        println!("Cleared {} history entries", count);
        return Ok(ExitCode::SUCCESS);
    }

    let records = stores.history.list();
    if args.json {
        let json = serde_json::to_string_pretty(&records).map_err(AppError::from)?;
        println!("{}", json);
    } else if records.is_empty() {
        println!("No uploads yet");
    } else {
        for record in &records {
            println!("{}", format_record(record));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn format_record(record: &UploadRecord) -> String {
    format!(
        "{}  {:>8}  {}  ({})",
        record.uploaded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        record.doc_ref,
        record.name,
        format_size(record.size_bytes)
    )
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
