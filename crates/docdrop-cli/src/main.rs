// SPDX-License-Identifier: AGPL-3.0
// Docdrop CLI - Command-line frontend

mod commands;
mod error;
mod render;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "docdrop")]
#[command(version, about = "Upload documents with bounded concurrency", long_about = None)]
struct Cli {
    /// Directory holding settings.json and history.json (defaults to the platform config dir)
    #[arg(long, global = true, env = "DOCDROP_CONFIG_DIR", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload one or more files
    Upload(commands::upload::UploadArgs),
    /// Show or clear the upload history
    History(commands::history::HistoryArgs),
    /// Show the current settings
    Settings,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; stdout is reserved for upload output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docdrop_cli=info".parse().unwrap())
                .add_directive("docdrop_core=info".parse().unwrap()),
        )
        .init();

    tracing::info!("Starting Docdrop CLI v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let stores = match commands::Stores::open(cli.config_dir) {
        Ok(stores) => stores,
        Err(e) => return e.report(),
    };

    let result = match cli.command {
        Command::Upload(args) => commands::upload::run(args, &stores).await,
        Command::History(args) => commands::history::run(args, &stores),
        Command::Settings => commands::settings::run(&stores),
    };

    match result {
        Ok(code) => code,
        Err(e) => e.report(),
    }
}
