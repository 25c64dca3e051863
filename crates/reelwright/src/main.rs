//! Reelwright CLI binary.
//!
//! Exit codes: 0 success, 1 stage failure, conflict, cancellation or storage
//! failure, 2 quota exceeded, 3 configuration or input error.

use clap::Parser;
use reelwright::{ExitStatus, ReelwrightError};
use std::process::ExitCode;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let status = if e.use_stderr() {
                ExitStatus::Usage
            } else {
                ExitStatus::Success
            };
            let _ = e.print();
            return status.into();
        }
    };

    match cli::run(cli).await {
        Ok(status) => status.into(),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<ReelwrightError>()
                .map(ExitStatus::for_error)
                .unwrap_or(ExitStatus::Failed)
                .into()
        }
    }
}
