mod auth_commands;
mod bootstrap_helpers;
mod commands;
mod interrupt;
mod install_probe;
mod limits_command;
mod oauth_callback;
mod profile;
mod shell;

use std::process::ExitCode;

use clap::Parser;
use globalping_cli::Cli;
use globalping_orchestrator::RunError;

use crate::bootstrap_helpers::init_tracing;
use crate::commands::run_cli;

const EXIT_FAILURE: u8 = 1;

pub(crate) fn report_error(error: &anyhow::Error) {
    eprintln!("Error: {error:#}");
}

fn exit_code_for(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<RunError>()
        .and_then(|error| u8::try_from(error.exit_code()).ok())
        .unwrap_or(EXIT_FAILURE)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_error(&error);
            ExitCode::from(exit_code_for(&error))
        }
    }
}
