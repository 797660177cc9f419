// External crates
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// Internal imports
use vm_logging::LogSettings;
use vm_provider::error::user_friendly;

// Local modules
mod cli;
mod commands;
mod state;

use cli::Args;
use commands::{execute_command, read_request, workspace_id_of};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut settings = LogSettings::from_env();
    if args.debug {
        settings.level = "debug".to_string();
    }
    let _log_guard = vm_logging::init_with(settings);

    let request = if args.command.takes_request() {
        match read_request::<serde_json::Value>(args.request.as_deref()) {
            Ok(value) => Some(value),
            Err(e) => {
                eprintln!("{}", user_friendly(args.command.operation(), None, &e));
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };
    let workspace = request.as_ref().and_then(workspace_id_of);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the running operation");
            on_signal.cancel();
        }
    });

    match execute_command(&args, request, &cancel).await {
        Ok(response) => {
            info!("{} finished", args.command.operation());
            println!("{}", response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(
                "{}",
                user_friendly(args.command.operation(), workspace.as_deref(), &e)
            );
            ExitCode::FAILURE
        }
    }
}
