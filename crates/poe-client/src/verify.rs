//! CLI wrapper for the verify functionality

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoff;
use clap::Args;
use poe_fetch::explorer::DEFAULT_EXPLORER_URL;
use poe_fetch::{BitcoinRpcTransactionFetcher, ExplorerTransactionFetcher, HttpDataFetcher};
use poe_verify::verify::DEFAULT_DATA_BASE_URL;
use poe_verify::{load_proof, ProofVerifier, TransactionFetcher, VerifierConfig};
use tracing::info;

/// CLI arguments for the `verify` subcommand
#[derive(Clone, Debug, Args)]
pub struct VerifyArgs {
    /// Path to read the proof document from
    #[arg(long)]
    proof_path: PathBuf,
    /// Fetch the registered data from this URL instead of the proof's location
    #[arg(long)]
    data_url: Option<String>,
    /// Base URL used to derive the data location when the proof carries none
    #[arg(long, env = "POE_DATA_BASE_URL", default_value = DEFAULT_DATA_BASE_URL)]
    data_base_url: String,
    /// Block explorer URL (blockchain.info API)
    #[arg(long, env = "POE_EXPLORER_URL", default_value = DEFAULT_EXPLORER_URL)]
    explorer_url: String,
    /// Bitcoin RPC URL, takes precedence over the explorer
    #[arg(long, env = "BITCOIN_RPC")]
    bitcoin_rpc_url: Option<String>,
    /// Bitcoin RPC user:password (optional)
    #[arg(long, env = "USERPWD")]
    bitcoin_rpc_userpwd: Option<String>,
    /// Timeout in seconds applied to each network fetch, unbounded when absent
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Exit with an error when the proof is not valid
    #[arg(long, default_value = "false")]
    strict: bool,
}

/// Run the `verify` subcommand: load a proof, analyze it and print the report
pub async fn run(args: VerifyArgs) -> Result<(), anyhow::Error> {
    let mut proof = load_proof(&args.proof_path)?;
    if let Some(data_url) = args.data_url {
        proof.data_location = Some(data_url);
    }

    let fetch_timeout = args.timeout_secs.map(Duration::from_secs);
    let config = VerifierConfig {
        data_base_url: args.data_base_url,
        fetch_timeout,
    };

    // Without --timeout-secs nothing bounds the fetches, neither the verifier nor the clients
    let data_fetcher = Arc::new(match fetch_timeout {
        Some(timeout) => HttpDataFetcher::with_timeout(timeout)?,
        None => HttpDataFetcher::new()?,
    });
    let transaction_fetcher: Arc<dyn TransactionFetcher> = match args.bitcoin_rpc_url {
        Some(url) => {
            info!("Looking up transactions through Bitcoin RPC");
            // Stop retrying once the lookup deadline has passed
            let backoff = ExponentialBackoff {
                max_elapsed_time: fetch_timeout,
                ..ExponentialBackoff::default()
            };
            Arc::new(BitcoinRpcTransactionFetcher::with_backoff(
                url,
                args.bitcoin_rpc_userpwd,
                backoff,
            )?)
        }
        None => {
            info!("Looking up transactions through {}", args.explorer_url);
            Arc::new(match fetch_timeout {
                Some(timeout) => {
                    ExplorerTransactionFetcher::with_timeout(args.explorer_url, timeout)?
                }
                None => ExplorerTransactionFetcher::new(args.explorer_url)?,
            })
        }
    };

    let verifier = ProofVerifier::new(proof, config, data_fetcher, transaction_fetcher)?;
    info!("Data location: {}", verifier.data_location());

    let report = verifier.analyze().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.strict && !report.overall_valid {
        anyhow::bail!("Proof is not valid");
    }
    Ok(())
}
