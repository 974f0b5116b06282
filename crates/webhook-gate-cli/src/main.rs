//! # Webhook Gate CLI
//!
//! Operator tool for signing payloads, sending signed test requests and
//! resetting rate-limit windows.

use webhook_gate_cli::{run_cli, CliError};

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        eprintln!("Error: {}", e);

        let exit_code = match e {
            CliError::InvalidArgument { .. } => 2,
            CliError::Io(_) => 3,
            CliError::Http(_) => 4,
            CliError::CommandFailed { .. } => 1,
        };

        std::process::exit(exit_code);
    }
}
