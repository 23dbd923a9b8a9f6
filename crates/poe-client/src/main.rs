//! Command line verifier for proof-of-existence anchoring proofs.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod verify;

/// Verify that data was anchored in the Bitcoin blockchain
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a proof document and print the verification report as JSON
    Verify(verify::VerifyArgs),
}

/// Logs go to stderr, stdout carries the report
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let outcome = match cli.command {
        Command::Verify(args) => verify::run(args).await,
    };

    match outcome {
        Ok(()) => {
            debug!("Verification finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Verification failed: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
